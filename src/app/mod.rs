//! Service wiring and control loop.

use crate::api::{ApiCommand, ApiServer};
use crate::call::BrowserCallSession;
use crate::capture::{CaptureParams, FfmpegCapturer};
use crate::config::Config;
use crate::recording::{
    CommandFinalizer, RecordingOptions, RecordingSession, SessionPhase, SessionStatusHandle,
};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub async fn run_service() -> Result<()> {
    info!("Starting callrec service");

    let config = Config::load()?;

    let (tx, mut rx) = mpsc::channel::<ApiCommand>(10);
    let status_handle = SessionStatusHandle::default();

    let api_server = ApiServer::new(tx, status_handle.clone(), &config);
    tokio::spawn(async move {
        if let Err(e) = api_server.start().await {
            error!("API server failed: {e}");
        }
    });

    info!("callrec is ready!");
    info!(
        "Start a recording: curl -X POST -H 'content-type: application/json' \
         -d '{{\"session_id\":\"room-1\"}}' http://127.0.0.1:{}/start",
        config.server.port
    );

    let mut current: Option<Arc<RecordingSession>> = None;
    while let Some(command) = rx.recv().await {
        match command {
            ApiCommand::StartSession(request) => {
                if current.is_some()
                    && status_handle.get().await.phase == SessionPhase::Running
                {
                    warn!("A recording session is already running, ignoring start");
                    continue;
                }

                match build_session(&config, request.session_id, status_handle.clone()) {
                    Ok(session) => {
                        let session = Arc::new(session);
                        match session.start().await {
                            Ok(()) => {
                                info!("Recording session started");
                                current = Some(session);
                            }
                            Err(e) => error!("Failed to start recording session: {e:#}"),
                        }
                    }
                    Err(e) => error!("Failed to configure recording session: {e:#}"),
                }
            }
            ApiCommand::StopSession => match current.take() {
                Some(session) => {
                    if let Err(e) = session.stop().await {
                        error!("Failed to stop recording session: {e:#}");
                    }
                }
                None => warn!("No recording session to stop"),
            },
        }
    }

    Ok(())
}

/// Sessions are single-use, so every start builds a fresh one from config.
fn build_session(
    config: &Config,
    session_id: String,
    status: SessionStatusHandle,
) -> Result<RecordingSession> {
    let recording_dir = config.recording_directory()?;
    std::fs::create_dir_all(&recording_dir)
        .with_context(|| format!("Failed to create recording directory {recording_dir:?}"))?;

    let options = RecordingOptions {
        recording_dir,
        base_url: config.call.base_url.clone(),
        session_id,
        finalize_command: PathBuf::from(&config.recording.finalize_command),
        max_restarts: config.recording.max_restarts,
    };

    let params = CaptureParams {
        resolution: config.capture.resolution.clone(),
        framerate: config.capture.framerate,
        display: config.capture.display.clone(),
        audio_device: config.capture.audio_device.clone(),
    };

    let call = BrowserCallSession::new(&config.call.browser_command, &options.base_url);
    let capturer = FfmpegCapturer::new(&config.capture.ffmpeg_path)
        .with_grace_period(Duration::from_secs(config.capture.stop_grace_seconds));
    let finalizer = CommandFinalizer::new(
        &options.finalize_command,
        config.recording.finalize_timeout_seconds,
    );

    Ok(RecordingSession::new(
        options,
        params,
        Box::new(call),
        Box::new(capturer),
        Box::new(finalizer),
        status,
    ))
}
