//! Status server handlers.
//!
//! Handlers only read the status board; the single write they perform is
//! flipping the shutdown signal.

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::info;

use podwatch_health::TargetSnapshot;

use crate::ApiState;

/// Body of `GET /healthy`.
#[derive(Debug, Serialize)]
pub struct HealthyResponse {
    pub healthy: bool,
}

/// GET /
pub async fn liveness() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /healthy
pub async fn healthy(State(state): State<ApiState>) -> Json<HealthyResponse> {
    Json(HealthyResponse {
        healthy: state.board.healthy().await,
    })
}

/// GET /status
pub async fn status(State(state): State<ApiState>) -> Json<Vec<TargetSnapshot>> {
    Json(state.board.snapshot().await)
}

/// GET /kill
///
/// Responds immediately; the server and the check loops wind down after.
pub async fn kill(State(state): State<ApiState>) -> impl IntoResponse {
    let already_killing = state.shutdown.send_replace(true);
    if !already_killing {
        info!("shutdown requested over http");
    }
    Json(serde_json::json!({ "killing": true }))
}
