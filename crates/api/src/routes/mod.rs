pub mod health;
pub mod onboarding;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /onboarding/sessions/...      onboarding wizard sessions
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/onboarding", onboarding::router())
}
