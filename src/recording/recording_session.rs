//! Recording session orchestrator.
//!
//! Manages the full lifecycle of one recorded call:
//! join call → start capture → supervise → stop capture → leave call → finalize
//!
//! All collaborators are injected via constructor; no concrete types are
//! hardcoded. Crash notifications travel from the supervisor to a per-session
//! restart loop over a channel, so restarts never run on the supervisor's own
//! task.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::call::CallSession;
use crate::capture::{CaptureParams, Capturer, LaunchError};
use crate::sink::Sink;
use crate::supervisor::ProcessSupervisor;

use super::finalize::{FinalizeContext, Finalizer};
use super::status::{SessionPhase, SessionStatusHandle};

/// Immutable configuration for one recording session.
#[derive(Debug, Clone)]
pub struct RecordingOptions {
    /// Directory the recording is written into.
    pub recording_dir: PathBuf,
    /// Base address of the call service.
    pub base_url: String,
    /// Identifier of the call to join.
    pub session_id: String,
    /// Executable run after the session to move/upload the artifact.
    pub finalize_command: PathBuf,
    /// Consecutive crash-restarts before the session gives up.
    pub max_restarts: u32,
}

/// A crash-triggered capture restart that itself failed to launch.
#[derive(Debug, Error)]
#[error("capture restart failed: {source}")]
pub struct SupervisionRestartError {
    #[from]
    source: LaunchError,
}

struct CaptureState {
    capturer: Box<dyn Capturer>,
    supervisor: Option<ProcessSupervisor>,
    restarts: u32,
}

struct RestartLoop {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RestartLoop {
    async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

struct Lifecycle {
    phase: SessionPhase,
    call: Box<dyn CallSession>,
    restart_loop: Option<RestartLoop>,
}

/// Orchestrates one recorded call. Single-use: `start()` then `stop()`,
/// each callable once. Both run under the same lock, so concurrent lifecycle
/// calls serialize and the loser observes the resulting state.
pub struct RecordingSession {
    options: RecordingOptions,
    params: CaptureParams,
    sink: Sink,
    capture: Arc<Mutex<CaptureState>>,
    finalizer: Box<dyn Finalizer>,
    status: SessionStatusHandle,
    lifecycle: Mutex<Lifecycle>,
}

impl RecordingSession {
    pub fn new(
        options: RecordingOptions,
        params: CaptureParams,
        call: Box<dyn CallSession>,
        capturer: Box<dyn Capturer>,
        finalizer: Box<dyn Finalizer>,
        status: SessionStatusHandle,
    ) -> Self {
        let sink = Sink::new(options.recording_dir.clone(), options.session_id.clone());
        Self {
            options,
            params,
            sink,
            capture: Arc::new(Mutex::new(CaptureState {
                capturer,
                supervisor: None,
                restarts: 0,
            })),
            finalizer,
            status,
            lifecycle: Mutex::new(Lifecycle {
                phase: SessionPhase::Created,
                call,
                restart_loop: None,
            }),
        }
    }

    pub fn status(&self) -> SessionStatusHandle {
        self.status.clone()
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    /// Join the call, start capture, and attach supervision.
    ///
    /// A capture launch failure aborts the start: the browser session is
    /// released best-effort and the session becomes unusable.
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        match lifecycle.phase {
            SessionPhase::Created => {}
            phase => bail!("Cannot start session in phase {}", phase.as_str()),
        }

        info!("Joining call {}", self.options.session_id);
        if let Err(e) = lifecycle.call.join(&self.options.session_id).await {
            lifecycle.phase = SessionPhase::Failed;
            self.status.failed(e.to_string()).await;
            return Err(e).context("Failed to join call");
        }

        let (exit_tx, exit_rx) = mpsc::unbounded_channel::<i32>();
        {
            let mut capture = self.capture.lock().await;
            if let Err(e) = capture.capturer.start(&self.params, &self.sink).await {
                error!("Failed to start capture: {e}");
                if let Err(leave_err) = lifecycle.call.leave_and_release().await {
                    warn!("Failed to release browser session after launch failure: {leave_err}");
                }
                lifecycle.phase = SessionPhase::Failed;
                self.status.failed(e.to_string()).await;
                return Err(e).context("Failed to start capture");
            }

            if let Some(exit_signal) = capture.capturer.exit_signal() {
                let tx = exit_tx.clone();
                capture.supervisor =
                    Some(ProcessSupervisor::attach(exit_signal, move |code| async move {
                        let _ = tx.send(code);
                    }));
            }
        }

        lifecycle.restart_loop = Some(self.spawn_restart_loop(exit_rx, exit_tx));
        lifecycle.phase = SessionPhase::Running;
        self.status.running(&self.options.session_id).await;
        info!("Recording session {} running", self.options.session_id);
        Ok(())
    }

    /// Tear the session down: detach supervision, stop capture, leave the
    /// call, run the finalize step.
    ///
    /// Always reaches `Stopped`; individual teardown failures are recorded
    /// and do not prevent the remaining steps from running.
    pub async fn stop(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        match lifecycle.phase {
            SessionPhase::Running => {}
            phase => bail!("Cannot stop session in phase {}", phase.as_str()),
        }

        // Supervision must be fully stopped before the capture process is
        // touched, or the intentional exit would trigger a restart.
        if let Some(restart_loop) = lifecycle.restart_loop.take() {
            restart_loop.shutdown().await;
        }
        {
            let mut capture = self.capture.lock().await;
            if let Some(supervisor) = capture.supervisor.take() {
                supervisor.detach().await;
            }
        }

        info!("Stopping capturer");
        {
            let mut capture = self.capture.lock().await;
            if let Err(e) = capture.capturer.stop().await {
                warn!("Capture process did not stop cleanly: {e}");
                self.status.record_error(e.to_string()).await;
            }
        }

        info!("Quitting browser session");
        if let Err(e) = lifecycle.call.leave_and_release().await {
            warn!("Failed to leave call cleanly: {e}");
            self.status.record_error(e.to_string()).await;
        }

        info!("Finalizing the recording");
        let ctx = FinalizeContext {
            recording_dir: self.options.recording_dir.clone(),
            session_id: self.options.session_id.clone(),
            artifact_path: self.sink.base_path(),
        };
        match self.finalizer.run(&ctx).await {
            Ok(code) => {
                info!("Recording finalize command finished with exit value: {code}");
                self.status.record_finalize(code).await;
            }
            Err(e) => {
                error!("Failed to run finalize command: {e}");
                self.status.record_error(e.to_string()).await;
            }
        }

        lifecycle.phase = SessionPhase::Stopped;
        self.status.stopped().await;
        info!("Recording session {} stopped", self.options.session_id);
        Ok(())
    }

    /// Consume crash notifications and restart capture with the session's
    /// params and sink, re-attaching a fresh supervisor each time.
    fn spawn_restart_loop(
        &self,
        mut exit_rx: mpsc::UnboundedReceiver<i32>,
        exit_tx: mpsc::UnboundedSender<i32>,
    ) -> RestartLoop {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let capture = Arc::clone(&self.capture);
        let params = self.params.clone();
        let sink = self.sink.clone();
        let status = self.status.clone();
        let max_restarts = self.options.max_restarts;

        let task = tokio::spawn(async move {
            loop {
                let code = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    maybe = exit_rx.recv() => match maybe {
                        Some(code) => code,
                        None => break,
                    },
                };

                error!("Capture process is no longer running, exited with code {code}");
                let mut state = capture.lock().await;

                // The supervisor that reported this exit is spent.
                if let Some(supervisor) = state.supervisor.take() {
                    supervisor.detach().await;
                }

                if state.restarts >= max_restarts {
                    error!("Capture crashed {max_restarts} times, giving up");
                    status
                        .record_error(format!(
                            "capture crashed {max_restarts} times, no longer restarting"
                        ))
                        .await;
                    break;
                }
                state.restarts += 1;
                status.record_restart().await;

                match state.capturer.start(&params, &sink).await {
                    Ok(()) => {
                        if let Some(exit_signal) = state.capturer.exit_signal() {
                            let tx = exit_tx.clone();
                            state.supervisor = Some(ProcessSupervisor::attach(
                                exit_signal,
                                move |code| async move {
                                    let _ = tx.send(code);
                                },
                            ));
                        }
                    }
                    Err(e) => {
                        // A failed restart must not kill this loop.
                        let e = SupervisionRestartError::from(e);
                        error!("{e}");
                        status.record_error(e.to_string()).await;
                    }
                }
            }
        });

        RestartLoop { cancel, task }
    }
}
