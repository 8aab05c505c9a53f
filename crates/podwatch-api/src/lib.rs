//! podwatch-api — HTTP control surface of the controller.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Liveness of the controller itself |
//! | GET | `/healthy` | Aggregate health across all targets |
//! | GET | `/status` | Per-target snapshots with outcome history |
//! | GET | `/kill` | Request graceful shutdown |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use podwatch_health::StatusBoard;
use tokio::sync::watch;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub board: StatusBoard,
    /// Set to `true` to begin graceful shutdown.
    pub shutdown: Arc<watch::Sender<bool>>,
}

/// Build the status router.
pub fn build_router(board: StatusBoard, shutdown: Arc<watch::Sender<bool>>) -> Router {
    let state = ApiState { board, shutdown };

    Router::new()
        .route("/", get(handlers::liveness))
        .route("/healthy", get(handlers::healthy))
        .route("/status", get(handlers::status))
        .route("/kill", get(handlers::kill))
        .with_state(state)
}
