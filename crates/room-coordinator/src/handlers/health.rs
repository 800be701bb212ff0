//! Liveness handlers.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/ping
pub async fn ping() -> &'static str {
    "pong"
}

/// Health check handler.
///
/// The store is in memory and was filled by the startup resync, so a process
/// that answers is healthy. The counts are informational.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "rooms": 3,
///   "observers": 12
/// }
/// ```
#[instrument(skip_all, name = "rc.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        rooms: state.store.room_count().await,
        observers: state.broadcaster.observer_count().await,
    })
}
