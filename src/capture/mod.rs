//! Media capture subprocess management.
//!
//! The orchestrator only depends on the [`Capturer`] contract; the ffmpeg
//! adapter is the production implementation and tests substitute an
//! in-memory fake.

pub mod ffmpeg;

pub use ffmpeg::FfmpegCapturer;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use crate::sink::Sink;

/// Parameters for a capture launch.
///
/// Built fresh for every session start; a crash-restart reuses the session's
/// instance unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureParams {
    pub resolution: String,
    pub framerate: u32,
    pub display: String,
    pub audio_device: String,
}

impl Default for CaptureParams {
    fn default() -> Self {
        Self {
            resolution: "1920x1080".to_string(),
            framerate: 30,
            display: ":0".to_string(),
            audio_device: "default".to_string(),
        }
    }
}

/// The capture subprocess could not be launched.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("capture binary not found: {0}")]
    MissingBinary(String),
    #[error("a capture process is already running")]
    AlreadyRunning,
    #[error("failed to spawn capture process: {0}")]
    Spawn(#[from] std::io::Error),
}

/// The capture subprocess did not stop cleanly.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("no capture process to stop")]
    NotRunning,
    #[error("capture process {pid} did not exit within {grace:?} and was killed")]
    GracePeriodExpired { pid: u32, grace: Duration },
    #[error("failed to signal capture process: {0}")]
    Signal(#[from] std::io::Error),
}

/// Non-owning exit handle for a running capture process.
///
/// Holds `None` while the process runs and the exit code once it has
/// terminated. Cloning is cheap and never confers ownership of the process.
pub type ExitSignal = watch::Receiver<Option<i32>>;

/// Starts and stops an external media-capture subprocess.
///
/// At most one capture process may be live per capturer; a second `start`
/// before a matching `stop` is rejected.
#[async_trait]
pub trait Capturer: Send {
    /// Launch the capture subprocess writing to `sink`.
    async fn start(&mut self, params: &CaptureParams, sink: &Sink) -> Result<(), LaunchError>;

    /// Request graceful termination, escalating to a kill after a grace
    /// period.
    async fn stop(&mut self) -> Result<(), ShutdownError>;

    /// Exit signal of the current capture process, if one was started.
    fn exit_signal(&self) -> Option<ExitSignal>;

    /// Whether a capture process is currently live.
    fn is_live(&self) -> bool;
}
