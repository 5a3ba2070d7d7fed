//! ffmpeg capture adapter.
//!
//! Spawns ffmpeg grabbing the configured display and audio device into the
//! sink. Stop sends SIGTERM first so ffmpeg can finalize the container, then
//! SIGKILL once the grace period expires.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{CaptureParams, Capturer, ExitSignal, LaunchError, ShutdownError};
use crate::sink::Sink;

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);
const KILL_WAIT: Duration = Duration::from_secs(2);

pub struct FfmpegCapturer {
    ffmpeg_path: String,
    grace_period: Duration,
    running: Option<RunningCapture>,
    segment: u32,
}

struct RunningCapture {
    pid: u32,
    exit_rx: ExitSignal,
}

impl FfmpegCapturer {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            grace_period: DEFAULT_GRACE_PERIOD,
            running: None,
            segment: 0,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}

#[async_trait]
impl Capturer for FfmpegCapturer {
    async fn start(&mut self, params: &CaptureParams, sink: &Sink) -> Result<(), LaunchError> {
        if self.is_live() {
            return Err(LaunchError::AlreadyRunning);
        }

        let binary = which::which(&self.ffmpeg_path)
            .map_err(|_| LaunchError::MissingBinary(self.ffmpeg_path.clone()))?;

        let output = sink.segment_path(self.segment);
        let mut child = Command::new(binary)
            .arg("-y")
            .args(["-f", "x11grab"])
            .args(["-video_size", &params.resolution])
            .args(["-framerate", &params.framerate.to_string()])
            .args(["-i", &params.display])
            .args(["-f", "pulse"])
            .args(["-i", &params.audio_device])
            .arg(&output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id().unwrap_or(0);
        let (exit_tx, exit_rx) = watch::channel(None);

        // The waiter task owns the child; everyone else observes it through
        // the watch channel.
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    warn!("Failed to wait on capture process {pid}: {e}");
                    -1
                }
            };
            let _ = exit_tx.send(Some(code));
        });

        info!("Capture started (pid {pid}) writing to {:?}", output);
        self.segment += 1;
        self.running = Some(RunningCapture { pid, exit_rx });
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ShutdownError> {
        let RunningCapture { pid, mut exit_rx } =
            self.running.take().ok_or(ShutdownError::NotRunning)?;

        if exit_rx.borrow().is_some() {
            debug!("Capture process {pid} already exited");
            return Ok(());
        }

        send_signal(pid, "-TERM").await?;
        if tokio::time::timeout(self.grace_period, exit_rx.wait_for(|code| code.is_some()))
            .await
            .is_ok()
        {
            info!("Capture process {pid} stopped");
            return Ok(());
        }

        warn!("Capture process {pid} ignored SIGTERM, killing");
        send_signal(pid, "-KILL").await?;
        let _ = tokio::time::timeout(KILL_WAIT, exit_rx.wait_for(|code| code.is_some())).await;
        Err(ShutdownError::GracePeriodExpired {
            pid,
            grace: self.grace_period,
        })
    }

    fn exit_signal(&self) -> Option<ExitSignal> {
        self.running.as_ref().map(|r| r.exit_rx.clone())
    }

    fn is_live(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| r.exit_rx.borrow().is_none())
    }
}

async fn send_signal(pid: u32, signal: &str) -> Result<(), std::io::Error> {
    let status = Command::new("kill")
        .arg(signal)
        .arg(pid.to_string())
        .status()
        .await?;
    if !status.success() {
        debug!("kill {signal} {pid} exited with {status}, process may already be gone");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_a_launch_error() {
        let mut capturer = FfmpegCapturer::new("definitely-not-a-real-binary");
        let sink = Sink::new("/tmp", "room-1");
        let err = capturer
            .start(&CaptureParams::default(), &sink)
            .await
            .expect_err("start should fail");
        assert!(matches!(err, LaunchError::MissingBinary(_)));
        assert!(!capturer.is_live());
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let mut capturer = FfmpegCapturer::new("ffmpeg");
        let err = capturer.stop().await.expect_err("stop should fail");
        assert!(matches!(err, ShutdownError::NotRunning));
    }

    #[tokio::test]
    async fn test_exit_signal_reports_exit_code() {
        // `true` ignores the ffmpeg-style arguments and exits 0 immediately,
        // which is all this test needs from the subprocess.
        let dir = tempfile::tempdir().expect("tempdir");
        let mut capturer = FfmpegCapturer::new("true");
        let sink = Sink::new(dir.path(), "room-1");

        capturer
            .start(&CaptureParams::default(), &sink)
            .await
            .expect("start should succeed");

        let mut exit_rx = capturer.exit_signal().expect("exit signal");
        let code = *exit_rx
            .wait_for(|code| code.is_some())
            .await
            .expect("exit signal sender dropped");
        assert_eq!(code, Some(0));

        // Stopping after the process already exited is not an error.
        capturer.stop().await.expect("stop should succeed");
    }
}
