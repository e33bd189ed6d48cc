//! Route definitions for onboarding sessions.

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::handlers::onboarding;
use crate::state::AppState;

/// Onboarding routes mounted at `/api/v1/onboarding`.
///
/// ```text
/// POST   /sessions                         -> open_session
/// GET    /sessions/{key}                   -> get_session
/// DELETE /sessions/{key}                   -> close_session
/// PUT    /sessions/{key}/fields            -> update_field
/// PUT    /sessions/{key}/state             -> replace_state
/// POST   /sessions/{key}/advance           -> advance
/// POST   /sessions/{key}/go-back           -> go_back
/// POST   /sessions/{key}/decision          -> decide
/// POST   /sessions/{key}/workers/bulk      -> bulk_import_workers
/// DELETE /sessions/{key}/workers/{index}   -> remove_worker
/// PUT    /sessions/{key}/groups            -> assign_group
/// POST   /sessions/{key}/start-over        -> start_over
/// POST   /sessions/{key}/save              -> save
/// POST   /sessions/{key}/submit            -> submit
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(onboarding::open_session))
        .route(
            "/sessions/{key}",
            get(onboarding::get_session).delete(onboarding::close_session),
        )
        .route("/sessions/{key}/fields", put(onboarding::update_field))
        .route("/sessions/{key}/state", put(onboarding::replace_state))
        .route("/sessions/{key}/advance", post(onboarding::advance))
        .route("/sessions/{key}/go-back", post(onboarding::go_back))
        .route("/sessions/{key}/decision", post(onboarding::decide))
        .route(
            "/sessions/{key}/workers/bulk",
            post(onboarding::bulk_import_workers),
        )
        .route(
            "/sessions/{key}/workers/{index}",
            delete(onboarding::remove_worker),
        )
        .route("/sessions/{key}/groups", put(onboarding::assign_group))
        .route("/sessions/{key}/start-over", post(onboarding::start_over))
        .route("/sessions/{key}/save", post(onboarding::save))
        .route("/sessions/{key}/submit", post(onboarding::submit))
}
