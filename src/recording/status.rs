//! Session status types and shared state handle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Phase of a recording session lifecycle.
///
/// Sessions are single-use: `Created → Running → Stopped`, with `Failed` as
/// the terminal state of a start that aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Created,
    Running,
    Stopped,
    Failed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

/// Current session state, readable by API handlers.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub session_id: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub restarts: u32,
    pub finalize_exit_code: Option<i32>,
    pub last_error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Created,
            session_id: None,
            started_at: None,
            restarts: 0,
            finalize_exit_code: None,
            last_error: None,
        }
    }
}

impl SessionState {
    /// Duration since the session started, in seconds.
    pub fn duration_seconds(&self) -> Option<u64> {
        self.started_at.map(|started| {
            let elapsed = chrono::Utc::now() - started;
            elapsed.num_seconds().max(0) as u64
        })
    }
}

/// Thread-safe handle for sharing session state between the orchestrator and
/// API handlers.
#[derive(Clone, Default)]
pub struct SessionStatusHandle {
    inner: Arc<Mutex<SessionState>>,
}

impl SessionStatusHandle {
    pub async fn get(&self) -> SessionState {
        self.inner.lock().await.clone()
    }

    pub async fn running(&self, session_id: &str) {
        let mut state = self.inner.lock().await;
        state.phase = SessionPhase::Running;
        state.session_id = Some(session_id.to_string());
        state.started_at = Some(chrono::Utc::now());
        state.restarts = 0;
        state.finalize_exit_code = None;
        state.last_error = None;
    }

    pub async fn record_restart(&self) {
        let mut state = self.inner.lock().await;
        state.restarts += 1;
    }

    /// Record an error without changing phase (shutdown and finalize errors
    /// are surfaced this way, since they do not abort the session).
    pub async fn record_error(&self, error: String) {
        let mut state = self.inner.lock().await;
        state.last_error = Some(error);
    }

    pub async fn record_finalize(&self, exit_code: i32) {
        let mut state = self.inner.lock().await;
        state.finalize_exit_code = Some(exit_code);
    }

    pub async fn stopped(&self) {
        let mut state = self.inner.lock().await;
        state.phase = SessionPhase::Stopped;
    }

    pub async fn failed(&self, error: String) {
        let mut state = self.inner.lock().await;
        state.phase = SessionPhase::Failed;
        state.last_error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_phase_as_str() {
        assert_eq!(SessionPhase::Created.as_str(), "created");
        assert_eq!(SessionPhase::Running.as_str(), "running");
        assert_eq!(SessionPhase::Stopped.as_str(), "stopped");
        assert_eq!(SessionPhase::Failed.as_str(), "failed");
    }

    #[test]
    fn test_session_phase_serialization() {
        let phase = SessionPhase::Running;
        let json = serde_json::to_string(&phase).unwrap();
        assert_eq!(json, "\"running\"");

        let parsed: SessionPhase = serde_json::from_str("\"stopped\"").unwrap();
        assert_eq!(parsed, SessionPhase::Stopped);
    }

    #[test]
    fn test_session_state_default() {
        let state = SessionState::default();
        assert_eq!(state.phase, SessionPhase::Created);
        assert!(state.session_id.is_none());
        assert!(state.started_at.is_none());
        assert_eq!(state.restarts, 0);
        assert!(state.finalize_exit_code.is_none());
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn test_status_handle_running() {
        let handle = SessionStatusHandle::default();
        handle.running("room-1").await;

        let state = handle.get().await;
        assert_eq!(state.phase, SessionPhase::Running);
        assert_eq!(state.session_id, Some("room-1".to_string()));
        assert!(state.started_at.is_some());
    }

    #[tokio::test]
    async fn test_status_handle_restarts() {
        let handle = SessionStatusHandle::default();
        handle.running("room-1").await;
        handle.record_restart().await;
        handle.record_restart().await;
        assert_eq!(handle.get().await.restarts, 2);

        // A new session resets the counter.
        handle.running("room-2").await;
        assert_eq!(handle.get().await.restarts, 0);
    }

    #[tokio::test]
    async fn test_status_handle_error_keeps_phase() {
        let handle = SessionStatusHandle::default();
        handle.running("room-1").await;
        handle.record_error("capture did not stop cleanly".to_string()).await;

        let state = handle.get().await;
        assert_eq!(state.phase, SessionPhase::Running);
        assert_eq!(
            state.last_error,
            Some("capture did not stop cleanly".to_string())
        );
    }

    #[tokio::test]
    async fn test_status_handle_lifecycle() {
        let handle = SessionStatusHandle::default();
        assert_eq!(handle.get().await.phase, SessionPhase::Created);

        handle.running("room-1").await;
        assert_eq!(handle.get().await.phase, SessionPhase::Running);

        handle.record_finalize(0).await;
        handle.stopped().await;

        let state = handle.get().await;
        assert_eq!(state.phase, SessionPhase::Stopped);
        assert_eq!(state.finalize_exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_status_handle_failed() {
        let handle = SessionStatusHandle::default();
        handle.failed("could not launch capture".to_string()).await;

        let state = handle.get().await;
        assert_eq!(state.phase, SessionPhase::Failed);
        assert_eq!(state.last_error, Some("could not launch capture".to_string()));
    }
}
