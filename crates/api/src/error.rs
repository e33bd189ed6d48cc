use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use onboard_core::error::CoreError;
use onboard_core::onboarding_wizard::NavigationError;
use onboard_session::SessionError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`SessionError`] and [`CoreError`] and adds HTTP-specific
/// variants. Implements [`IntoResponse`] to produce consistent JSON error
/// responses: `{ "error", "code" }`, plus `step`, `errors`, and
/// `fieldErrors` when a step failed validation.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

fn internal(source: &dyn std::fmt::Display) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %source, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
        CoreError::Validation(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "VALIDATION_ERROR",
            msg.clone(),
        ),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => internal(msg),
    }
}

fn classify_navigation(err: &NavigationError) -> (StatusCode, &'static str, String) {
    let (status, code) = match err {
        NavigationError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
        NavigationError::DecisionRequired(_) => (StatusCode::BAD_REQUEST, "DECISION_REQUIRED"),
        NavigationError::SubmissionRequired => (StatusCode::CONFLICT, "SUBMISSION_REQUIRED"),
        NavigationError::NotAtStep(_) => (StatusCode::CONFLICT, "WRONG_STEP"),
        NavigationError::Terminal => (StatusCode::CONFLICT, "ONBOARDING_FINISHED"),
    };
    (status, code, err.to_string())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Session(session) => match session {
                SessionError::Navigation(nav) => classify_navigation(nav),
                SessionError::Core(core) => classify_core(core),
                SessionError::Draft(draft) => internal(draft),
                SessionError::NotADecisionStep(_) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", session.to_string())
                }
                SessionError::SubmissionInFlight => (
                    StatusCode::CONFLICT,
                    "SUBMISSION_IN_FLIGHT",
                    session.to_string(),
                ),
                SessionError::Submission(e) => {
                    tracing::warn!(error = %e, "Submission rejected upstream");
                    (
                        StatusCode::BAD_GATEWAY,
                        "SUBMISSION_FAILED",
                        "The onboarding could not be delivered; it can be submitted again"
                            .to_string(),
                    )
                }
                SessionError::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", session.to_string())
                }
            },
            AppError::Core(core) => classify_core(core),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });

        if let AppError::Session(SessionError::Navigation(NavigationError::Validation(failure))) =
            &self
        {
            body["step"] = json!(failure.step);
            body["errors"] = json!(failure.errors);
            body["fieldErrors"] = json!(failure.field_errors);
        }

        (status, axum::Json(body)).into_response()
    }
}
