//! Core types for the intake session
//!
//! Defines the fundamental types of the wizard:
//! - Steps and their display labels
//! - Questionnaire answers (age, skin tone, concerns)
//! - Submission lifecycle
//! - Session and capture configuration

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Unique session identifier (ULID for sortability in logs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Ulid);

impl SessionId {
    /// Generate new session ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wizard step; exactly one is active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Step {
    /// Overview and entry choices
    #[default]
    Intro,
    /// Age, skin tone, concerns and consent
    Questionnaire,
    /// Live camera or file upload
    Capture,
    /// Still preview and summary before sending
    Review,
    /// Analysis output
    Results,
}

impl Step {
    /// All steps in wizard order
    pub const ALL: [Step; 5] = [
        Step::Intro,
        Step::Questionnaire,
        Step::Capture,
        Step::Review,
        Step::Results,
    ];

    /// Position in the stepper, starting at zero
    #[inline]
    #[must_use]
    pub fn ordinal(self) -> usize {
        match self {
            Step::Intro => 0,
            Step::Questionnaire => 1,
            Step::Capture => 2,
            Step::Review => 3,
            Step::Results => 4,
        }
    }

    /// Stepper label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Step::Intro => "Intro",
            Step::Questionnaire => "Questions",
            Step::Capture => "Camera / Upload",
            Step::Review => "Review & Send",
            Step::Results => "Results",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Self-reported skin tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkinTone {
    /// Light
    Light,
    /// Fair
    Fair,
    /// Medium
    #[default]
    Medium,
    /// Olive
    Olive,
    /// Brown
    Brown,
    /// Dark
    Dark,
}

impl SkinTone {
    /// Every selectable tone, in form order
    pub const ALL: [SkinTone; 6] = [
        SkinTone::Light,
        SkinTone::Fair,
        SkinTone::Medium,
        SkinTone::Olive,
        SkinTone::Brown,
        SkinTone::Dark,
    ];

    /// Wire value sent in the `skinTone` form field
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SkinTone::Light => "light",
            SkinTone::Fair => "fair",
            SkinTone::Medium => "medium",
            SkinTone::Olive => "olive",
            SkinTone::Brown => "brown",
            SkinTone::Dark => "dark",
        }
    }
}

impl fmt::Display for SkinTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkinTone {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|tone| tone.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SessionError::InvalidAnswer(format!("unknown skin tone {s:?}")))
    }
}

/// Main concern tag; the set is closed
///
/// Ordering follows declaration order so concern sets serialize
/// deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Concern {
    /// "Acne / Breakouts"
    Acne,
    /// "Redness / Rosacea"
    Redness,
    /// "Dryness / Dehydration"
    Dryness,
    /// "Pigmentation / Dark spots"
    Pigmentation,
    /// "Aging / Fine lines"
    Aging,
    /// "Other"
    Other,
}

impl Concern {
    /// Every selectable concern, in form order
    pub const ALL: [Concern; 6] = [
        Concern::Acne,
        Concern::Redness,
        Concern::Dryness,
        Concern::Pigmentation,
        Concern::Aging,
        Concern::Other,
    ];

    /// Label shown to the user and sent on the wire
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Concern::Acne => "Acne / Breakouts",
            Concern::Redness => "Redness / Rosacea",
            Concern::Dryness => "Dryness / Dehydration",
            Concern::Pigmentation => "Pigmentation / Dark spots",
            Concern::Aging => "Aging / Fine lines",
            Concern::Other => "Other",
        }
    }
}

impl fmt::Display for Concern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Concern {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SessionError::InvalidAnswer(format!("unknown concern {s:?}")))
    }
}

impl Serialize for Concern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Concern {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}

/// Questionnaire answers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Answers {
    /// Age in years, if given
    pub age: Option<u32>,
    /// Self-reported skin tone
    pub skin_tone: SkinTone,
    /// Selected concerns
    pub concerns: BTreeSet<Concern>,
}

/// Single questionnaire field update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerUpdate {
    /// Set or clear the age; zero is rejected
    Age(Option<u32>),
    /// Select a skin tone
    SkinTone(SkinTone),
}

/// Lifecycle of the outbound analysis request
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Submission {
    /// Nothing sent yet
    #[default]
    Idle,
    /// Request outstanding
    InFlight,
    /// Endpoint answered; body is passed through for display
    Succeeded(serde_json::Value),
    /// Transport or server failure message
    Failed(String),
}

impl Submission {
    /// Check if a request is outstanding
    #[inline]
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Submission::InFlight)
    }

    /// Result body, if the last submission succeeded
    #[must_use]
    pub fn result(&self) -> Option<&serde_json::Value> {
        match self {
            Submission::Succeeded(body) => Some(body),
            _ => None,
        }
    }
}

/// Camera direction preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Front camera
    User,
    /// Rear camera
    #[default]
    Environment,
}

/// Camera request and still normalization settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Preferred camera direction
    pub facing: Facing,
    /// Ideal stream width in pixels
    pub ideal_width: u32,
    /// Ideal stream height in pixels
    pub ideal_height: u32,
    /// Side of the centered square crop as a fraction of the shorter dimension
    pub crop_ratio: f32,
    /// Side of the normalized square still in pixels
    pub output_size: u32,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            facing: Facing::Environment,
            ideal_width: 1280,
            ideal_height: 720,
            crop_ratio: 0.8,
            output_size: 1024,
            jpeg_quality: 92,
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capture and normalization settings
    pub capture: CaptureConfig,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: usize,
}

impl SessionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With capture settings
    #[inline]
    #[must_use]
    pub fn with_capture(mut self, capture: CaptureConfig) -> Self {
        self.capture = capture;
        self
    }

    /// With normalized still size
    #[inline]
    #[must_use]
    pub fn with_output_size(mut self, size: u32) -> Self {
        self.capture.output_size = size;
        self
    }

    /// With upload size limit
    #[inline]
    #[must_use]
    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}
