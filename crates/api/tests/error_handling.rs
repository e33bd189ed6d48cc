//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly; no server is involved.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use onboard_api::error::AppError;
use onboard_core::error::CoreError;
use onboard_core::onboarding_wizard::{NavigationError, OnboardingStep, ValidationFailure};
use onboard_db::DraftStoreError;
use onboard_events::CollaboratorError;
use onboard_session::SessionError;

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn step_validation_returns_422_with_field_errors() {
    let failure = ValidationFailure {
        step: OnboardingStep::Admin,
        errors: vec!["Debe registrar al menos un administrador".into()],
        field_errors: BTreeMap::from([(
            "admins".to_string(),
            "Debe registrar al menos un administrador".to_string(),
        )]),
    };
    let err = AppError::Session(SessionError::Navigation(NavigationError::Validation(failure)));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "VALIDATION_ERROR");
    assert_eq!(json["step"], "admin");
    assert_eq!(
        json["fieldErrors"]["admins"],
        "Debe registrar al menos un administrador"
    );
    assert_eq!(json["errors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn failed_submission_returns_502_without_upstream_detail() {
    let err = AppError::Session(SessionError::Submission(CollaboratorError::HttpStatus(503)));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["code"], "SUBMISSION_FAILED");
    assert!(!json["error"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn submission_in_flight_returns_409() {
    let (status, json) = error_to_response(SessionError::SubmissionInFlight.into()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "SUBMISSION_IN_FLIGHT");
}

#[tokio::test]
async fn unknown_session_returns_404() {
    let (status, json) =
        error_to_response(SessionError::NotFound("local-x".into()).into()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Session local-x not found");
}

#[tokio::test]
async fn terminal_step_returns_409() {
    let err: AppError = SessionError::Navigation(NavigationError::Terminal).into();
    let (status, json) = error_to_response(err).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "ONBOARDING_FINISHED");
}

#[tokio::test]
async fn draft_errors_are_sanitized() {
    let err: AppError = SessionError::Draft(DraftStoreError::WriterClosed).into();
    let (status, json) = error_to_response(err).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn core_errors_keep_their_mapping() {
    let (status, json) = error_to_response(AppError::Core(CoreError::Conflict(
        "Los trabajadores espejo se editan desde administradores".into(),
    )))
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");

    let (status, _) = error_to_response(AppError::Core(CoreError::Validation("x".into()))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, json) = error_to_response(AppError::BadRequest("bad".into())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad");
}
