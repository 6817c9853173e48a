//! Testing utilities for SkinSight workspace
//!
//! Deterministic collaborators and image fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use parking_lot::Mutex;
use skinsight_core::{
    AnalysisClient, AnalysisError, AnalysisRequest, Camera, CaptureConstraints, CaptureError,
    Session, SessionConfig, StreamId,
};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Gradient frame so encoded output is not trivially compressible
pub fn frame(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    frame(width, height)
        .write_to(&mut out, ImageOutputFormat::Jpeg(90))
        .unwrap();
    out.into_inner()
}

/// Config with a small still so tests stay fast
pub fn small_config() -> SessionConfig {
    SessionConfig::new().with_output_size(32)
}

pub fn session_with(camera: Arc<FakeCamera>, client: Arc<FakeAnalysisClient>) -> Session {
    Session::builder(client)
        .config(small_config())
        .camera(camera)
        .build()
}

#[derive(Debug, Default)]
struct CameraState {
    holder: Option<StreamId>,
    next_id: u64,
    acquired: usize,
    released: usize,
    last_constraints: Option<CaptureConstraints>,
}

/// Single-device camera: one stream at a time, across every session using it
#[derive(Debug)]
pub struct FakeCamera {
    state: Mutex<CameraState>,
    failure: Option<CaptureError>,
    frame: DynamicImage,
    gate: Option<Arc<Notify>>,
}

impl FakeCamera {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CameraState::default()),
            failure: None,
            frame: frame(1280, 720),
            gate: None,
        }
    }

    /// Camera whose every acquisition fails
    pub fn unavailable(err: CaptureError) -> Self {
        Self {
            failure: Some(err),
            ..Self::new()
        }
    }

    /// Acquisitions wait for a `notify_one` on the returned handle
    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let camera = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::new()
        };
        (camera, gate)
    }

    pub fn with_frame(mut self, frame: DynamicImage) -> Self {
        self.frame = frame;
        self
    }

    pub fn is_held(&self) -> bool {
        self.state.lock().holder.is_some()
    }

    pub fn acquire_count(&self) -> usize {
        self.state.lock().acquired
    }

    pub fn release_count(&self) -> usize {
        self.state.lock().released
    }

    pub fn last_constraints(&self) -> Option<CaptureConstraints> {
        self.state.lock().last_constraints
    }
}

impl Default for FakeCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Camera for FakeCamera {
    async fn acquire(&self, constraints: CaptureConstraints) -> Result<StreamId, CaptureError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let mut state = self.state.lock();
        state.last_constraints = Some(constraints);
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if state.holder.is_some() {
            return Err(CaptureError::Busy);
        }
        state.next_id += 1;
        state.acquired += 1;
        let stream = StreamId(format!("stream-{}", state.next_id));
        state.holder = Some(stream.clone());
        Ok(stream)
    }

    fn grab_frame(&self, stream: &StreamId) -> Result<DynamicImage, CaptureError> {
        if self.state.lock().holder.as_ref() == Some(stream) {
            Ok(self.frame.clone())
        } else {
            Err(CaptureError::Stream(format!("{stream} is not live")))
        }
    }

    fn release(&self, stream: &StreamId) {
        let mut state = self.state.lock();
        if state.holder.as_ref() == Some(stream) {
            state.holder = None;
            state.released += 1;
        }
    }
}

/// Analysis client answering with a fixed response
#[derive(Debug)]
pub struct FakeAnalysisClient {
    response: Result<serde_json::Value, AnalysisError>,
    calls: AtomicUsize,
    last_request: Mutex<Option<AnalysisRequest>>,
    gate: Option<Arc<Notify>>,
}

impl FakeAnalysisClient {
    pub fn succeeding(body: serde_json::Value) -> Self {
        Self {
            response: Ok(body),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            gate: None,
        }
    }

    pub fn failing(err: AnalysisError) -> Self {
        Self {
            response: Err(err),
            ..Self::succeeding(serde_json::Value::Null)
        }
    }

    /// Requests wait for a `notify_one` on the returned handle
    pub fn gated(body: serde_json::Value) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let client = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::succeeding(body)
        };
        (client, gate)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<AnalysisRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl AnalysisClient for FakeAnalysisClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<serde_json::Value, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.response.clone()
    }
}
