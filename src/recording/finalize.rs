//! Finalize step run after a recording session ends.
//!
//! The finalize command typically moves or uploads the recorded artifact.
//! Its exit code is the only contract; a failing or missing command is
//! recorded but never fails the surrounding shutdown.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable names for session metadata passed to the finalize
/// command.
pub mod finalize_env {
    pub const RECORDING_DIR: &str = "CALLREC_RECORDING_DIR";
    pub const SESSION_ID: &str = "CALLREC_SESSION_ID";
    pub const ARTIFACT_PATH: &str = "CALLREC_ARTIFACT_PATH";
}

/// Metadata of a finished session, handed to the finalize step.
pub struct FinalizeContext {
    pub recording_dir: PathBuf,
    pub session_id: String,
    pub artifact_path: PathBuf,
}

/// The finalize command could not be run or its exit could not be observed.
#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("failed to launch finalize command: {0}")]
    Launch(#[source] std::io::Error),
    #[error("failed to observe finalize command exit: {0}")]
    Wait(#[source] std::io::Error),
    #[error("finalize command timed out after {0:?}")]
    Timeout(Duration),
}

/// Post-session finalize step.
#[async_trait]
pub trait Finalizer: Send + Sync {
    /// Run the finalize step synchronously and return its exit code.
    async fn run(&self, ctx: &FinalizeContext) -> Result<i32, FinalizeError>;
}

/// Runs the configured finalize executable.
///
/// Session metadata travels via environment variables; the command is
/// invoked with no arguments. The process is killed on timeout.
pub struct CommandFinalizer {
    command: PathBuf,
    timeout: Duration,
}

impl CommandFinalizer {
    pub fn new(command: impl Into<PathBuf>, timeout_seconds: u64) -> Self {
        Self {
            command: command.into(),
            timeout: Duration::from_secs(timeout_seconds),
        }
    }
}

#[async_trait]
impl Finalizer for CommandFinalizer {
    async fn run(&self, ctx: &FinalizeContext) -> Result<i32, FinalizeError> {
        info!(
            "Running finalize command for session {}: {:?}",
            ctx.session_id, self.command
        );

        let child = tokio::process::Command::new(&self.command)
            .env(
                finalize_env::RECORDING_DIR,
                ctx.recording_dir.as_os_str(),
            )
            .env(finalize_env::SESSION_ID, &ctx.session_id)
            .env(finalize_env::ARTIFACT_PATH, ctx.artifact_path.as_os_str())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(FinalizeError::Launch)?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let code = output.status.code().unwrap_or(-1);
                if output.status.success() {
                    info!("Finalize command finished with exit value: {code}");
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!(
                        "Finalize command exited with status {}: {}",
                        output.status,
                        stderr.trim()
                    );
                }
                Ok(code)
            }
            Ok(Err(e)) => Err(FinalizeError::Wait(e)),
            Err(_) => Err(FinalizeError::Timeout(self.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> FinalizeContext {
        FinalizeContext {
            recording_dir: PathBuf::from("/rec"),
            session_id: "room-1".to_string(),
            artifact_path: PathBuf::from("/rec/room-1.mp4"),
        }
    }

    #[test]
    fn test_finalize_env_constants() {
        assert_eq!(finalize_env::RECORDING_DIR, "CALLREC_RECORDING_DIR");
        assert_eq!(finalize_env::SESSION_ID, "CALLREC_SESSION_ID");
        assert_eq!(finalize_env::ARTIFACT_PATH, "CALLREC_ARTIFACT_PATH");
    }

    #[tokio::test]
    async fn test_successful_command_reports_exit_zero() {
        let finalizer = CommandFinalizer::new("/bin/true", 10);
        let code = finalizer.run(&ctx()).await.expect("command should run");
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let finalizer = CommandFinalizer::new("/bin/false", 10);
        let code = finalizer.run(&ctx()).await.expect("command should run");
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn test_missing_command_is_a_launch_error() {
        let finalizer = CommandFinalizer::new("/nonexistent/finalize.sh", 10);
        let err = finalizer.run(&ctx()).await.expect_err("launch should fail");
        assert!(matches!(err, FinalizeError::Launch(_)));
    }
}
