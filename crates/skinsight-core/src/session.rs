//! Intake session
//!
//! The session owns every piece of wizard state and is the only place it
//! changes:
//! - Navigation along the step graph
//! - Questionnaire answers and consent
//! - Camera stream lifetime and still capture
//! - Upload ingestion
//! - The single outbound analysis submission
//!
//! A `Session` is a cheap handle; clones share the same state. The lock is
//! never held across an `.await`: asynchronous operations mark what they are
//! waiting for, release the lock, and settle afterwards only if the session
//! generation still matches.

use crate::error::SessionError;
use crate::ports::{
    AnalysisClient, AnalysisRequest, Camera, CaptureConstraints, FileIngestor, ImageFileIngestor,
    NoCamera, StreamId,
};
use crate::state_machine::{next_step, validate_transition, NavAction};
use crate::still::{normalize, Still};
use crate::types::{AnswerUpdate, Answers, Concern, SessionConfig, SessionId, Step, Submission};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Observable session data
///
/// Published to subscribers after every action, successful or not.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    /// Active step
    pub step: Step,
    /// A live camera stream is held
    pub camera_active: bool,
    /// Current still, from capture or upload
    pub image: Option<Still>,
    /// Questionnaire answers
    pub answers: Answers,
    /// Consent to automated analysis
    pub consent: bool,
    /// Submission lifecycle
    pub submission: Submission,
    /// Message of the last rejected action
    pub last_error: Option<String>,
}

impl SessionState {
    /// Review summary lines in display order
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        let concerns: Vec<&str> = self.answers.concerns.iter().map(|c| c.label()).collect();
        vec![
            format!(
                "Age: {}",
                self.answers.age.map_or_else(|| "—".to_string(), |a| a.to_string())
            ),
            format!("Skin tone: {}", self.answers.skin_tone),
            format!(
                "Concerns: {}",
                if concerns.is_empty() {
                    "—".to_string()
                } else {
                    concerns.join(", ")
                }
            ),
            format!("Consent: {}", if self.consent { "Yes" } else { "No" }),
        ]
    }
}

/// Result of settling a submission
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Applied to the session; carries the response body
    Completed(serde_json::Value),
    /// The session was reset while the request was outstanding
    Discarded,
}

/// Held camera stream; released when dropped
struct StreamLease {
    camera: Arc<dyn Camera>,
    stream: StreamId,
}

impl Drop for StreamLease {
    fn drop(&mut self) {
        self.camera.release(&self.stream);
        tracing::debug!(stream = %self.stream, "camera stream released");
    }
}

/// Frees the camera slot if `begin_capture` is dropped mid-acquisition
struct AcquireGuard<'a> {
    session: &'a Session,
    ticket: u64,
    armed: bool,
}

impl AcquireGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AcquireGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.session.shared.inner.lock();
        if matches!(inner.camera, CameraSlot::Acquiring(t) if t == self.ticket) {
            inner.camera = CameraSlot::Idle;
            tracing::debug!(
                session_id = %self.session.id,
                ticket = self.ticket,
                "camera acquisition cancelled"
            );
        }
    }
}

enum CameraSlot {
    Idle,
    Acquiring(u64),
    Live(StreamLease),
}

struct Inner {
    state: SessionState,
    camera: CameraSlot,
    generation: u64,
    acquire_seq: u64,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: SessionState::default(),
            camera: CameraSlot::Idle,
            generation: 0,
            acquire_seq: 0,
        }
    }

    fn ensure_not_submitting(&self) -> Result<(), SessionError> {
        if self.state.submission.is_in_flight() {
            Err(SessionError::SubmissionInProgress)
        } else {
            Ok(())
        }
    }

    fn ensure_step(&self, step: Step, operation: &'static str) -> Result<(), SessionError> {
        if self.state.step == step {
            Ok(())
        } else {
            Err(SessionError::WrongStep {
                step: self.state.step,
                operation,
            })
        }
    }

    fn release_camera(&mut self) {
        self.camera = CameraSlot::Idle;
        self.state.camera_active = false;
    }

    fn move_to(&mut self, to: Step) -> Result<(), SessionError> {
        let from = self.state.step;
        validate_transition(from, to)?;
        if from == Step::Capture {
            self.release_camera();
        }
        self.state.step = to;
        Ok(())
    }

    // A new still always lands on Review, whichever step it came from.
    fn install_still(&mut self, still: Still) {
        self.release_camera();
        self.state.image = Some(still);
        self.state.step = Step::Review;
    }

    fn reset(&mut self) {
        self.release_camera();
        self.state = SessionState::default();
        self.generation += 1;
    }
}

struct Shared {
    inner: Mutex<Inner>,
    changes: watch::Sender<SessionState>,
}

/// Builder for [`Session`]
pub struct SessionBuilder {
    config: SessionConfig,
    analysis: Arc<dyn AnalysisClient>,
    camera: Option<Arc<dyn Camera>>,
    ingestor: Option<Arc<dyn FileIngestor>>,
}

impl SessionBuilder {
    /// With configuration
    #[inline]
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// With camera; defaults to [`NoCamera`]
    #[inline]
    #[must_use]
    pub fn camera(mut self, camera: Arc<dyn Camera>) -> Self {
        self.camera = Some(camera);
        self
    }

    /// With upload ingestor; defaults to [`ImageFileIngestor`]
    #[inline]
    #[must_use]
    pub fn ingestor(mut self, ingestor: Arc<dyn FileIngestor>) -> Self {
        self.ingestor = Some(ingestor);
        self
    }

    /// Create the session on the Intro step
    #[must_use]
    pub fn build(self) -> Session {
        let max_upload_bytes = self.config.max_upload_bytes;
        let ingestor: Arc<dyn FileIngestor> = match self.ingestor {
            Some(ingestor) => ingestor,
            None => Arc::new(ImageFileIngestor::new(max_upload_bytes)),
        };
        let camera: Arc<dyn Camera> = match self.camera {
            Some(camera) => camera,
            None => Arc::new(NoCamera),
        };
        let (changes, _) = watch::channel(SessionState::default());
        let session = Session {
            id: SessionId::new(),
            config: Arc::new(self.config),
            camera,
            ingestor,
            analysis: self.analysis,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::new()),
                changes,
            }),
        };
        tracing::info!(session_id = %session.id, "session created");
        session
    }
}

/// Guided intake session
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    config: Arc<SessionConfig>,
    camera: Arc<dyn Camera>,
    ingestor: Arc<dyn FileIngestor>,
    analysis: Arc<dyn AnalysisClient>,
    shared: Arc<Shared>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start building a session around an analysis client
    #[must_use]
    pub fn builder(analysis: Arc<dyn AnalysisClient>) -> SessionBuilder {
        SessionBuilder {
            config: SessionConfig::default(),
            analysis,
            camera: None,
            ingestor: None,
        }
    }

    /// Get session ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current state
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.shared.inner.lock().state.clone()
    }

    /// Active step
    #[must_use]
    pub fn step(&self) -> Step {
        self.shared.inner.lock().state.step
    }

    /// Number of resets so far
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.shared.inner.lock().generation
    }

    /// Receiver that always holds the latest published state
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.changes.subscribe()
    }

    /// Apply a navigation action
    pub fn navigate(&self, action: NavAction) -> Result<Step, SessionError> {
        self.mutate("navigate", |inner| {
            inner.ensure_not_submitting()?;
            let to = next_step(inner.state.step, action)?;
            match action {
                NavAction::ReviewCapture if inner.state.image.is_none() => {
                    Err(SessionError::NoImage)
                }
                NavAction::NewSession => {
                    inner.reset();
                    Ok(Step::Intro)
                }
                _ => {
                    let from = inner.state.step;
                    inner.move_to(to)?;
                    tracing::info!(session_id = %self.id, ?from, ?to, "step changed");
                    Ok(to)
                }
            }
        })
    }

    /// Update one questionnaire field
    pub fn set_answer(&self, update: AnswerUpdate) -> Result<(), SessionError> {
        self.mutate("set_answer", |inner| {
            inner.ensure_not_submitting()?;
            match update {
                AnswerUpdate::Age(Some(0)) => {
                    return Err(SessionError::InvalidAnswer(
                        "age must be a positive integer".to_string(),
                    ))
                }
                AnswerUpdate::Age(age) => inner.state.answers.age = age,
                AnswerUpdate::SkinTone(tone) => inner.state.answers.skin_tone = tone,
            }
            Ok(())
        })
    }

    /// Add the concern if absent, remove it if present
    ///
    /// Returns whether the concern is selected afterwards.
    pub fn toggle_concern(&self, concern: Concern) -> Result<bool, SessionError> {
        self.mutate("toggle_concern", |inner| {
            inner.ensure_not_submitting()?;
            let concerns = &mut inner.state.answers.concerns;
            if concerns.remove(&concern) {
                Ok(false)
            } else {
                concerns.insert(concern);
                Ok(true)
            }
        })
    }

    /// Record consent
    pub fn set_consent(&self, consent: bool) -> Result<(), SessionError> {
        self.mutate("set_consent", |inner| {
            inner.ensure_not_submitting()?;
            inner.state.consent = consent;
            Ok(())
        })
    }

    /// Acquire a camera stream
    ///
    /// If the session is reset or the Capture step left while the camera
    /// is being acquired, the new stream is released and the call returns
    /// `Ok` without touching state. Dropping the future before the camera
    /// answers frees the slot for another attempt.
    pub async fn begin_capture(&self) -> Result<(), SessionError> {
        let (ticket, generation) = self.mutate("begin_capture", |inner| {
            inner.ensure_not_submitting()?;
            inner.ensure_step(Step::Capture, "start the camera")?;
            if !matches!(inner.camera, CameraSlot::Idle) {
                return Err(SessionError::CameraAlreadyActive);
            }
            inner.acquire_seq += 1;
            inner.camera = CameraSlot::Acquiring(inner.acquire_seq);
            Ok((inner.acquire_seq, inner.generation))
        })?;

        let capture = &self.config.capture;
        let constraints = CaptureConstraints {
            facing: capture.facing,
            ideal_width: capture.ideal_width,
            ideal_height: capture.ideal_height,
        };
        let guard = AcquireGuard {
            session: self,
            ticket,
            armed: true,
        };
        let acquired = self.camera.acquire(constraints).await;
        guard.disarm();

        let mut inner = self.shared.inner.lock();
        let current = inner.generation == generation
            && matches!(inner.camera, CameraSlot::Acquiring(t) if t == ticket);
        if !current {
            if let Ok(stream) = acquired {
                drop(StreamLease {
                    camera: Arc::clone(&self.camera),
                    stream,
                });
            }
            tracing::debug!(session_id = %self.id, "discarded stale camera acquisition");
            return Ok(());
        }

        inner.state.last_error = None;
        let result = match acquired {
            Ok(stream) => {
                tracing::info!(session_id = %self.id, stream = %stream, "camera started");
                inner.camera = CameraSlot::Live(StreamLease {
                    camera: Arc::clone(&self.camera),
                    stream,
                });
                inner.state.camera_active = true;
                Ok(())
            }
            Err(err) => {
                inner.release_camera();
                Err(SessionError::from(err))
            }
        };
        self.commit(inner, "begin_capture", result)
    }

    /// Release any held camera stream; always succeeds
    pub fn end_capture(&self) {
        let _ = self.mutate("end_capture", |inner| {
            inner.release_camera();
            Ok(())
        });
    }

    /// Grab the current frame as the still and move to Review
    ///
    /// The stream is released even if grabbing or encoding fails.
    pub fn capture_still(&self) -> Result<(), SessionError> {
        let (frame, generation) = self.mutate("capture_still", |inner| {
            inner.ensure_not_submitting()?;
            let frame = match &inner.camera {
                CameraSlot::Live(lease) => self.camera.grab_frame(&lease.stream),
                _ => return Err(SessionError::NoActiveStream),
            };
            inner.release_camera();
            Ok((frame?, inner.generation))
        })?;

        let still = normalize(&frame, &self.config.capture);
        if let Ok(still) = &still {
            tracing::info!(session_id = %self.id, bytes = still.byte_len(), "still captured");
        }
        self.install_if_current("capture_still", generation, still)
    }

    /// Validate, decode and normalize an uploaded file, then move to Review
    pub fn ingest_upload(&self, bytes: &[u8], mime_type: &str) -> Result<(), SessionError> {
        let generation = self.mutate("ingest_upload", |inner| {
            inner.ensure_not_submitting()?;
            if !self.ingestor.validate_type(mime_type) {
                return Err(SessionError::InvalidFileType(mime_type.to_string()));
            }
            Ok(inner.generation)
        })?;

        let still = self
            .ingestor
            .decode(bytes)
            .map_err(SessionError::from)
            .and_then(|frame| normalize(&frame, &self.config.capture));
        if still.is_ok() {
            tracing::info!(
                session_id = %self.id,
                mime_type,
                upload_bytes = bytes.len(),
                "upload ingested"
            );
        }
        self.install_if_current("ingest_upload", generation, still)
    }

    /// Check submission preconditions and mark the submission in flight
    ///
    /// The returned handle must be settled to issue the request.
    pub fn start_submission(&self) -> Result<PendingSubmission, SessionError> {
        self.mutate("submit", |inner| {
            inner.ensure_not_submitting()?;
            if !inner.state.consent {
                return Err(SessionError::ConsentRequired);
            }
            let image = inner.state.image.clone().ok_or(SessionError::NoImage)?;
            inner.ensure_step(Step::Review, "submit")?;

            inner.state.submission = Submission::InFlight;
            tracing::info!(
                session_id = %self.id,
                generation = inner.generation,
                "submission started"
            );
            Ok(PendingSubmission {
                session: self.clone(),
                generation: inner.generation,
                request: AnalysisRequest::new(image, &inner.state.answers),
                settled: false,
            })
        })
    }

    /// Submit for analysis and wait for the outcome
    pub async fn submit(&self) -> Result<SubmitOutcome, SessionError> {
        self.start_submission()?.settle().await
    }

    /// Submit for analysis on the runtime; observe the outcome via state
    pub fn spawn_submit(
        &self,
    ) -> Result<JoinHandle<Result<SubmitOutcome, SessionError>>, SessionError> {
        let pending = self.start_submission()?;
        Ok(tokio::spawn(pending.settle()))
    }

    /// Restore every field to its initial value and release the camera
    pub fn reset(&self) {
        let mut inner = self.shared.inner.lock();
        inner.reset();
        tracing::info!(session_id = %self.id, generation = inner.generation, "session reset");
        let _ = self.commit(inner, "reset", Ok(()));
    }

    // Decoding and encoding run unlocked; a reset in the meantime wins.
    fn install_if_current(
        &self,
        operation: &'static str,
        generation: u64,
        still: Result<Still, SessionError>,
    ) -> Result<(), SessionError> {
        let mut inner = self.shared.inner.lock();
        if inner.generation != generation {
            tracing::debug!(session_id = %self.id, operation, "discarded still from before reset");
            return Ok(());
        }
        inner.state.last_error = None;
        let result = still.and_then(|still| {
            inner.ensure_not_submitting()?;
            inner.install_still(still);
            Ok(())
        });
        self.commit(inner, operation, result)
    }

    fn abandon_submission(&self, generation: u64) {
        let mut inner = self.shared.inner.lock();
        if inner.generation != generation || !inner.state.submission.is_in_flight() {
            return;
        }
        let err = SessionError::SubmissionAbandoned;
        inner.state.submission = Submission::Failed(err.to_string());
        let _ = self.commit(inner, "submit", Err::<(), _>(err));
    }

    fn settle_submission(
        &self,
        generation: u64,
        outcome: Result<serde_json::Value, crate::error::AnalysisError>,
    ) -> Result<SubmitOutcome, SessionError> {
        let mut inner = self.shared.inner.lock();
        if inner.generation != generation || !inner.state.submission.is_in_flight() {
            tracing::debug!(
                session_id = %self.id,
                stale_generation = generation,
                generation = inner.generation,
                "discarded stale submission result"
            );
            return Ok(SubmitOutcome::Discarded);
        }

        inner.state.last_error = None;
        let result = match outcome {
            Ok(body) => {
                inner.state.submission = Submission::Succeeded(body.clone());
                inner.move_to(Step::Results).map(|()| {
                    tracing::info!(session_id = %self.id, "submission succeeded");
                    SubmitOutcome::Completed(body)
                })
            }
            Err(err) => {
                let err = SessionError::from(err);
                inner.state.submission = Submission::Failed(err.to_string());
                Err(err)
            }
        };
        self.commit(inner, "submit", result)
    }

    fn mutate<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Inner) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let mut inner = self.shared.inner.lock();
        inner.state.last_error = None;
        let result = f(&mut inner);
        self.commit(inner, operation, result)
    }

    fn commit<T>(
        &self,
        mut inner: MutexGuard<'_, Inner>,
        operation: &'static str,
        result: Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        if let Err(err) = &result {
            tracing::warn!(
                session_id = %self.id,
                step = ?inner.state.step,
                operation,
                error = %err,
                "action rejected"
            );
            inner.state.last_error = Some(err.to_string());
        }
        let snapshot = inner.state.clone();
        drop(inner);
        self.shared.changes.send_replace(snapshot);
        result
    }
}

/// Submission that passed its preconditions and is marked in flight
///
/// Dropping it unsettled, or cancelling [`settle`](Self::settle) before the
/// response arrives, marks the submission failed so the session stays usable.
#[must_use = "the request is only sent when the submission is settled"]
pub struct PendingSubmission {
    session: Session,
    generation: u64,
    request: AnalysisRequest,
    settled: bool,
}

impl PendingSubmission {
    /// Send the request and apply its outcome
    pub async fn settle(mut self) -> Result<SubmitOutcome, SessionError> {
        let outcome = self.session.analysis.analyze(&self.request).await;
        self.settled = true;
        self.session.settle_submission(self.generation, outcome)
    }
}

impl Drop for PendingSubmission {
    fn drop(&mut self) {
        if !self.settled {
            self.session.abandon_submission(self.generation);
        }
    }
}

impl fmt::Debug for PendingSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSubmission")
            .field("session", &self.session.id)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
