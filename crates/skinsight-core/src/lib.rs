//! SkinSight Core - guided intake session
//!
//! The logical core of the intake wizard:
//! - Walks the user through Intro, Questionnaire, Capture, Review and Results
//! - Collects questionnaire answers and consent
//! - Drives camera capture and file upload into one normalized still
//! - Gates and settles the single outbound analysis submission
//!
//! Devices, files and the network are reached only through the traits in
//! [`ports`], so hosts and tests choose their own implementations.
//!
//! # Example
//!
//! ```rust,ignore
//! use skinsight_core::prelude::*;
//!
//! # async fn example(client: std::sync::Arc<dyn AnalysisClient>, jpeg: &[u8]) -> Result<(), SessionError> {
//! let session = Session::builder(client).build();
//!
//! session.navigate(NavAction::BeginQuestionnaire)?;
//! session.set_answer(AnswerUpdate::Age(Some(29)))?;
//! session.toggle_concern(Concern::Acne)?;
//! session.set_consent(true)?;
//! session.navigate(NavAction::ContinueToCapture)?;
//! session.ingest_upload(jpeg, "image/jpeg")?;
//!
//! let outcome = session.submit().await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod ports;
pub mod session;
pub mod state_machine;
pub mod still;
pub mod types;

// Re-exports for convenience
pub use error::{AnalysisError, CaptureError, IngestError, SessionError};
pub use ports::{
    AnalysisClient, AnalysisRequest, Camera, CaptureConstraints, FileIngestor, ImageFileIngestor,
    NoCamera, StreamId,
};
pub use session::{PendingSubmission, Session, SessionBuilder, SessionState, SubmitOutcome};
pub use state_machine::NavAction;
pub use still::Still;
pub use types::{
    AnswerUpdate, Answers, CaptureConfig, Concern, Facing, SessionConfig, SessionId, SkinTone,
    Step, Submission,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving a session
    pub use crate::{
        AnalysisClient, AnswerUpdate, Camera, Concern, NavAction, Session, SessionConfig,
        SessionError, SessionState, SkinTone, Step, Submission, SubmitOutcome,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
