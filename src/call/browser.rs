//! Browser-backed call session.
//!
//! Launches the configured browser in app mode pointed at the call URL and
//! tears it down on leave. Media capture happens out-of-band (the capture
//! subprocess records the display), so the browser only has to keep the
//! call open.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::CallSession;

const LEAVE_GRACE_PERIOD: Duration = Duration::from_secs(5);

pub struct BrowserCallSession {
    browser_command: String,
    base_url: String,
    child: Option<Child>,
}

impl BrowserCallSession {
    pub fn new(browser_command: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            browser_command: browser_command.into(),
            base_url: base_url.into(),
            child: None,
        }
    }

    fn call_url(&self, session_id: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), session_id)
    }
}

#[async_trait]
impl CallSession for BrowserCallSession {
    async fn join(&mut self, session_id: &str) -> Result<()> {
        if self.child.is_some() {
            bail!("Browser session already joined a call");
        }

        let binary = which::which(&self.browser_command)
            .with_context(|| format!("Browser command not found: {}", self.browser_command))?;

        let url = self.call_url(session_id);
        info!("Joining call {session_id} at {url}");

        let child = Command::new(binary)
            .arg(format!("--app={url}"))
            .arg("--autoplay-policy=no-user-gesture-required")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to launch browser")?;

        self.child = Some(child);
        Ok(())
    }

    async fn leave_and_release(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            debug!("No browser session to release");
            return Ok(());
        };

        // SIGTERM first so the browser can leave the call cleanly.
        if let Some(pid) = child.id() {
            let _ = Command::new("kill")
                .arg("-TERM")
                .arg(pid.to_string())
                .status()
                .await;
        }

        match tokio::time::timeout(LEAVE_GRACE_PERIOD, child.wait()).await {
            Ok(Ok(status)) => info!("Browser session exited with {status}"),
            Ok(Err(e)) => warn!("Failed to wait on browser session: {e}"),
            Err(_) => {
                warn!("Browser ignored SIGTERM, killing");
                child.kill().await.context("Failed to kill browser")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_url_joins_base_and_session() {
        let session = BrowserCallSession::new("chromium", "https://meet.example.com");
        assert_eq!(
            session.call_url("room-1"),
            "https://meet.example.com/room-1"
        );
    }

    #[test]
    fn test_call_url_strips_trailing_slash() {
        let session = BrowserCallSession::new("chromium", "https://meet.example.com/");
        assert_eq!(
            session.call_url("room-1"),
            "https://meet.example.com/room-1"
        );
    }

    #[tokio::test]
    async fn test_leave_without_join_is_a_noop() {
        let mut session = BrowserCallSession::new("chromium", "https://meet.example.com");
        session.leave_and_release().await.expect("leave is a no-op");
    }

    #[tokio::test]
    async fn test_join_with_missing_browser_fails() {
        let mut session =
            BrowserCallSession::new("definitely-not-a-real-browser", "https://meet.example.com");
        assert!(session.join("room-1").await.is_err());
    }
}
