//! Recording session module.
//!
//! Orchestrates one recorded call: browser join, capture subprocess,
//! crash supervision, and the post-session finalize step.

pub mod finalize;
pub mod recording_session;
pub mod status;

pub use finalize::{CommandFinalizer, FinalizeContext, FinalizeError, Finalizer};
pub use recording_session::{RecordingOptions, RecordingSession, SupervisionRestartError};
pub use status::{SessionPhase, SessionState, SessionStatusHandle};
