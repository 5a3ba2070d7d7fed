//! Session control endpoints.
//!
//! Provides HTTP endpoints for:
//! - Starting a recording session (POST /start)
//! - Stopping the current session (POST /stop)
//! - Getting session status (GET /status)

use crate::api::error::{ApiError, ApiResult};
use crate::recording::SessionStatusHandle;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Request body for the start endpoint.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StartRequest {
    /// Identifier of the call to join and record.
    pub session_id: String,
}

#[derive(Clone)]
pub enum ApiCommand {
    StartSession(StartRequest),
    StopSession,
}

#[derive(Clone)]
pub struct SessionRoutesState {
    pub tx: mpsc::Sender<ApiCommand>,
    pub status: SessionStatusHandle,
}

/// Creates the router with all session control endpoints.
pub fn router(state: SessionRoutesState) -> Router {
    Router::new()
        .route("/start", post(start_session))
        .route("/stop", post(stop_session))
        .route("/status", get(session_status))
        .with_state(state)
}

async fn start_session(
    State(state): State<SessionRoutesState>,
    Json(request): Json<StartRequest>,
) -> ApiResult<Json<Value>> {
    if request.session_id.trim().is_empty() {
        return Err(ApiError::bad_request("session_id is required"));
    }

    state
        .tx
        .send(ApiCommand::StartSession(request))
        .await
        .map_err(|_| ApiError::internal("Service control loop is not running"))?;

    Ok(Json(json!({ "status": "starting" })))
}

async fn stop_session(State(state): State<SessionRoutesState>) -> ApiResult<Json<Value>> {
    state
        .tx
        .send(ApiCommand::StopSession)
        .await
        .map_err(|_| ApiError::internal("Service control loop is not running"))?;

    Ok(Json(json!({ "status": "stopping" })))
}

async fn session_status(State(state): State<SessionRoutesState>) -> Json<Value> {
    let session = state.status.get().await;
    Json(json!({
        "phase": session.phase.as_str(),
        "session_id": session.session_id,
        "started_at": session.started_at.map(|t| t.to_rfc3339()),
        "duration_seconds": session.duration_seconds(),
        "restarts": session.restarts,
        "finalize_exit_code": session.finalize_exit_code,
        "last_error": session.last_error,
    }))
}
