//! Error types for the intake session
//!
//! Provides error handling for:
//! - Rejected navigation and field updates
//! - Camera acquisition and still capture
//! - Upload validation and decoding
//! - Submission preconditions and analysis failures

use crate::state_machine::NavAction;
use crate::types::Step;

/// Main session error type
///
/// Every variant is recoverable at the session boundary: the failing
/// operation leaves the session unchanged apart from `last_error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Camera could not be acquired or stopped producing frames
    #[error("Unable to access camera. Please allow camera permissions or upload an image. ({0})")]
    CameraUnavailable(String),

    /// A stream is already held or being acquired
    #[error("camera is already active")]
    CameraAlreadyActive,

    /// Still requested without a live stream
    #[error("no active camera stream to capture from")]
    NoActiveStream,

    /// Upload does not declare an image type
    #[error("Please upload a valid image file. (got {0:?})")]
    InvalidFileType(String),

    /// Upload or frame could not be decoded or encoded
    #[error("could not read image: {0}")]
    DecodeError(String),

    /// Questionnaire value outside its domain
    #[error("invalid answer: {0}")]
    InvalidAnswer(String),

    /// Submission attempted without consent
    #[error("You must consent to submit your image for automated analysis.")]
    ConsentRequired,

    /// Submission attempted without a still
    #[error("No image to analyze. Please capture or upload an image.")]
    NoImage,

    /// Another submission is still outstanding
    #[error("a submission is already in progress")]
    SubmissionInProgress,

    /// Submission was dropped before its outcome arrived
    #[error("Upload failed.")]
    SubmissionAbandoned,

    /// Action has no edge from the current step
    #[error("cannot {action} from the {step} step")]
    InvalidTransition {
        /// Step the session was on
        step: Step,
        /// Rejected action
        action: NavAction,
    },

    /// Operation not offered on the current step
    #[error("cannot {operation} on the {step} step")]
    WrongStep {
        /// Step the session was on
        step: Step,
        /// Rejected operation
        operation: &'static str,
    },

    /// Step change outside the transition graph
    #[error("illegal step change {from:?} -> {to:?}")]
    IllegalStepChange {
        /// Current step
        from: Step,
        /// Requested step
        to: Step,
    },

    /// Request never produced a usable response
    #[error("{0}")]
    TransportError(String),

    /// Endpoint answered with a non-success status
    #[error("{0}")]
    ServerError(String),
}

impl SessionError {
    /// Check if repeating the same action may succeed without user changes
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CameraUnavailable(_)
                | Self::SubmissionAbandoned
                | Self::TransportError(_)
                | Self::ServerError(_)
        )
    }
}

/// Camera collaborator errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// Permission denied by the user or platform
    #[error("permission denied")]
    PermissionDenied,

    /// No matching capture device
    #[error("no camera device found")]
    NoDevice,

    /// Device held by another session
    #[error("camera is in use by another session")]
    Busy,

    /// Stream ended or frame could not be read
    #[error("stream failure: {0}")]
    Stream(String),
}

impl From<CaptureError> for SessionError {
    fn from(err: CaptureError) -> Self {
        SessionError::CameraUnavailable(err.to_string())
    }
}

/// File-ingestion collaborator errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    /// Upload smaller than any valid image
    #[error("file too small ({0} bytes)")]
    TooSmall(usize),

    /// Upload exceeds the configured limit
    #[error("file too large ({size} bytes, limit {limit})")]
    TooLarge {
        /// Upload size
        size: usize,
        /// Configured limit
        limit: usize,
    },

    /// Bytes are not a decodable image
    #[error("{0}")]
    Decode(String),
}

impl From<IngestError> for SessionError {
    fn from(err: IngestError) -> Self {
        SessionError::DecodeError(err.to_string())
    }
}

impl From<image::ImageError> for IngestError {
    fn from(err: image::ImageError) -> Self {
        IngestError::Decode(err.to_string())
    }
}

/// Analysis collaborator errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    /// Connection, timeout or body read failure
    #[error("{0}")]
    Transport(String),

    /// Non-success status; message is the response body text
    #[error("{message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Body text, or a generic message when empty
        message: String,
    },

    /// Success status with a body that is not JSON
    #[error("invalid response body: {0}")]
    InvalidResponse(String),
}

impl AnalysisError {
    /// Build a server error, falling back to a generic message for empty bodies
    pub fn server(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = if body.trim().is_empty() {
            "Server error".to_string()
        } else {
            body
        };
        Self::Server { status, message }
    }
}

impl From<AnalysisError> for SessionError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Server { message, .. } => SessionError::ServerError(message),
            other => SessionError::TransportError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_uses_body_text() {
        let err = AnalysisError::server(422, "face not detected");
        assert_eq!(
            SessionError::from(err),
            SessionError::ServerError("face not detected".to_string())
        );
    }

    #[test]
    fn empty_server_body_falls_back() {
        let err = AnalysisError::server(500, "  ");
        assert_eq!(err.to_string(), "Server error");
    }

    #[test]
    fn capture_errors_become_camera_unavailable() {
        let err: SessionError = CaptureError::PermissionDenied.into();
        assert!(matches!(err, SessionError::CameraUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn precondition_failures_are_not_retryable() {
        assert!(!SessionError::ConsentRequired.is_retryable());
        assert!(!SessionError::NoImage.is_retryable());
        assert!(!SessionError::SubmissionInProgress.is_retryable());
        assert!(SessionError::SubmissionAbandoned.is_retryable());
    }

    #[test]
    fn consent_message_matches_intake_copy() {
        assert_eq!(
            SessionError::ConsentRequired.to_string(),
            "You must consent to submit your image for automated analysis."
        );
    }
}
