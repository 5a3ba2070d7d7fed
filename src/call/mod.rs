//! Call session management.
//!
//! Joining and leaving the recorded call is delegated to a browser-driven
//! session; the orchestrator depends only on this narrow contract.

pub mod browser;

pub use browser::BrowserCallSession;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CallSession: Send {
    /// Join the call identified by `session_id`.
    async fn join(&mut self, session_id: &str) -> Result<()>;

    /// Leave the call and release the underlying browser session.
    ///
    /// Expected to succeed after a successful join; callers treat a failure
    /// here as a warning, not a fatal error.
    async fn leave_and_release(&mut self) -> Result<()>;
}
