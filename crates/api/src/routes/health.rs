use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Where drafts are kept: `postgres` or `memory`.
    pub draft_store: &'static str,
    /// Whether the draft database is reachable. Always true for memory.
    pub db_healthy: bool,
    /// Sessions currently held by this process.
    pub live_sessions: usize,
}

/// GET /health -- returns service and draft store health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (draft_store, db_healthy) = match &state.pool {
        Some(pool) => ("postgres", onboard_db::health_check(pool).await.is_ok()),
        None => ("memory", true),
    };

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        draft_store,
        db_healthy,
        live_sessions: state.registry.len().await,
    })
}

/// Mount health check routes (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
