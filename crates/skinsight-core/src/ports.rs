//! Collaborator interfaces
//!
//! The session never touches devices, files or the network directly. Hosts
//! inject implementations of these traits; tests inject deterministic fakes.

use crate::error::{AnalysisError, CaptureError, IngestError};
use crate::still::Still;
use crate::types::{Answers, Facing, SkinTone};
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to an acquired camera stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub String);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Requested stream properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    /// Preferred camera direction
    pub facing: Facing,
    /// Ideal width in pixels
    pub ideal_width: u32,
    /// Ideal height in pixels
    pub ideal_height: u32,
}

/// Live camera capability
#[async_trait]
pub trait Camera: Send + Sync {
    /// Open a stream
    async fn acquire(&self, constraints: CaptureConstraints) -> Result<StreamId, CaptureError>;

    /// Read the current frame of an open stream
    fn grab_frame(&self, stream: &StreamId) -> Result<DynamicImage, CaptureError>;

    /// Stop a stream; releasing an unknown or stopped stream is a no-op
    fn release(&self, stream: &StreamId);
}

/// [`Camera`] for hosts without a capture device
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCamera;

#[async_trait]
impl Camera for NoCamera {
    async fn acquire(&self, _constraints: CaptureConstraints) -> Result<StreamId, CaptureError> {
        Err(CaptureError::NoDevice)
    }

    fn grab_frame(&self, _stream: &StreamId) -> Result<DynamicImage, CaptureError> {
        Err(CaptureError::NoDevice)
    }

    fn release(&self, _stream: &StreamId) {}
}

/// Upload validation and decoding capability
#[cfg_attr(test, mockall::automock)]
pub trait FileIngestor: Send + Sync {
    /// Whether the declared mime type is accepted at all
    fn validate_type(&self, mime_type: &str) -> bool;

    /// Decode uploaded bytes into a frame
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, IngestError>;
}

/// Smallest byte count any real image file can have
const MIN_IMAGE_BYTES: usize = 67;

/// [`FileIngestor`] backed by the `image` crate
///
/// The format is sniffed from content; the declared type only gates entry.
#[derive(Debug, Clone)]
pub struct ImageFileIngestor {
    max_bytes: usize,
}

impl ImageFileIngestor {
    /// Create an ingestor accepting uploads up to `max_bytes`
    #[inline]
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl Default for ImageFileIngestor {
    fn default() -> Self {
        Self::new(crate::types::SessionConfig::default().max_upload_bytes)
    }
}

impl FileIngestor for ImageFileIngestor {
    fn validate_type(&self, mime_type: &str) -> bool {
        mime_type
            .trim()
            .get(..6)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, IngestError> {
        if bytes.len() < MIN_IMAGE_BYTES {
            return Err(IngestError::TooSmall(bytes.len()));
        }
        if bytes.len() > self.max_bytes {
            return Err(IngestError::TooLarge {
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }
        Ok(image::load_from_memory(bytes)?)
    }
}

/// Outbound analysis request
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// Normalized still
    pub image: Still,
    /// Age, if answered
    pub age: Option<u32>,
    /// Selected skin tone
    pub skin_tone: SkinTone,
    /// Selected concern labels in form order
    pub concerns: Vec<String>,
}

impl AnalysisRequest {
    /// Multipart file name of the still
    pub const IMAGE_FILE_NAME: &'static str = "skin.jpg";
    /// Multipart content type of the still
    pub const IMAGE_MIME: &'static str = "image/jpeg";

    /// Build from a still and the questionnaire answers
    #[must_use]
    pub fn new(image: Still, answers: &Answers) -> Self {
        Self {
            image,
            age: answers.age,
            skin_tone: answers.skin_tone,
            concerns: answers.concerns.iter().map(|c| c.label().to_string()).collect(),
        }
    }

    /// `age` field: stringified integer or empty
    #[must_use]
    pub fn age_field(&self) -> String {
        self.age.map(|a| a.to_string()).unwrap_or_default()
    }

    /// `skinTone` field
    #[must_use]
    pub fn skin_tone_field(&self) -> &'static str {
        self.skin_tone.as_str()
    }

    /// `concerns` field: JSON array of strings
    #[must_use]
    pub fn concerns_field(&self) -> String {
        serde_json::Value::from(self.concerns.clone()).to_string()
    }

    /// Text fields in wire order, after the `image` part
    #[must_use]
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("age", self.age_field()),
            ("skinTone", self.skin_tone_field().to_string()),
            ("concerns", self.concerns_field()),
        ]
    }
}

/// Remote analysis capability
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Send one request and return the parsed success body
    async fn analyze(&self, request: &AnalysisRequest) -> Result<serde_json::Value, AnalysisError>;
}
