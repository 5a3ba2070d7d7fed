//! REST API server for callrec.
//!
//! Provides HTTP endpoints for:
//! - Session control (start, stop, status)
//! - Service info and version

pub mod error;
pub mod routes;

use crate::config::Config;
use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tracing::info;

pub use routes::session::{ApiCommand, SessionRoutesState, StartRequest};

pub struct ApiServer {
    port: u16,
    session_state: SessionRoutesState,
}

impl ApiServer {
    pub fn new(
        tx: tokio::sync::mpsc::Sender<ApiCommand>,
        status: crate::recording::SessionStatusHandle,
        config: &Config,
    ) -> Self {
        Self {
            port: config.server.port,
            session_state: SessionRoutesState { tx, status },
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = Router::new()
            .route("/", get(status))
            .route("/version", get(version))
            .merge(routes::session::router(self.session_state))
            .layer(ServiceBuilder::new());

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("API server listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET  /        - Service info");
        info!("  GET  /version - Get version info");
        info!("  POST /start   - Start a recording session");
        info!("  POST /stop    - Stop the current session");
        info!("  GET  /status  - Get session status");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "callrec",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "callrec"
    }))
}
