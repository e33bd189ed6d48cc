use std::sync::Arc;

use onboard_session::SessionRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: inner data is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Live onboarding sessions.
    pub registry: Arc<SessionRegistry>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Postgres pool backing the draft store, `None` with in-memory drafts.
    pub pool: Option<onboard_db::DbPool>,
}
