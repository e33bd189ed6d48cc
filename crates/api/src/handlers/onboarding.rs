//! Handlers for onboarding wizard sessions.
//!
//! Every successful call answers with the session view and the warnings
//! the operation produced (autosave failures, unreachable collaborators).
//! Operations on one session are serialized by its registry lock.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use onboard_core::model::WizardState;
use onboard_core::onboarding_wizard::{Decision, Transition};
use onboard_core::roster::{RejectedRow, RosterSection};
use onboard_session::{OpenRequest, SessionView, WizardSession};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    /// Token from a CRM link: a record id or an encrypted prefill token.
    pub token: Option<String>,
    /// Key of a session to resume.
    pub session_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFieldRequest {
    /// Dotted path into the form state, e.g. `company.razonSocial`.
    pub path: String,
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
}

#[derive(Debug, Deserialize)]
pub struct BulkImportRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignGroupRequest {
    pub section: RosterSection,
    pub index: usize,
    /// Group name as typed. Blank clears the group.
    pub group_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    pub groups_created: usize,
    pub rejected: Vec<RejectedRow>,
}

/// Body of every successful session response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session: SessionView,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<bool>,
}

impl SessionResponse {
    fn of(session: &mut WizardSession) -> Self {
        Self {
            session: session.view(),
            warnings: session.take_warnings(),
            transition: None,
            import: None,
            saved: None,
        }
    }
}

fn ok(response: SessionResponse) -> Json<DataResponse<SessionResponse>> {
    Json(DataResponse { data: response })
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// POST /api/v1/onboarding/sessions
///
/// Open a session from a CRM token, resume one by key, or start a blank
/// one. Returns 201 with the session view. The same token always maps to
/// the same `sessionKey`; a blank session can only be resumed by its key.
pub async fn open_session(
    State(state): State<AppState>,
    Json(input): Json<OpenSessionRequest>,
) -> AppResult<impl IntoResponse> {
    let shared = state
        .registry
        .open(OpenRequest {
            token: input.token,
            session_key: input.session_key,
        })
        .await?;
    let mut session = shared.lock().await;

    tracing::info!(
        session_key = %session.key(),
        step = %session.current_step(),
        "Onboarding session opened"
    );

    Ok((StatusCode::CREATED, ok(SessionResponse::of(&mut session))))
}

/// GET /api/v1/onboarding/sessions/{key}
pub async fn get_session(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<impl IntoResponse> {
    let shared = state.registry.get(&key).await?;
    let mut session = shared.lock().await;
    Ok(ok(SessionResponse::of(&mut session)))
}

/// DELETE /api/v1/onboarding/sessions/{key}
///
/// Flush pending autosaves and release the session. The draft stays, so
/// the session can be resumed later.
pub async fn close_session(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.registry.close(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Edits
// ---------------------------------------------------------------------------

/// PUT /api/v1/onboarding/sessions/{key}/fields
///
/// Set one value by dotted path. Autosaved after the debounce window.
pub async fn update_field(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(input): Json<UpdateFieldRequest>,
) -> AppResult<impl IntoResponse> {
    let shared = state.registry.get(&key).await?;
    let mut session = shared.lock().await;
    session.update_field(&input.path, input.value)?;
    Ok(ok(SessionResponse::of(&mut session)))
}

/// PUT /api/v1/onboarding/sessions/{key}/state
///
/// Replace the whole form state.
pub async fn replace_state(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(input): Json<WizardState>,
) -> AppResult<impl IntoResponse> {
    let shared = state.registry.get(&key).await?;
    let mut session = shared.lock().await;
    session.replace_state(input)?;
    Ok(ok(SessionResponse::of(&mut session)))
}

/// POST /api/v1/onboarding/sessions/{key}/workers/bulk
///
/// Import workers from pasted spreadsheet rows. Rejected rows are
/// reported, the rest are appended.
pub async fn bulk_import_workers(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(input): Json<BulkImportRequest>,
) -> AppResult<impl IntoResponse> {
    let shared = state.registry.get(&key).await?;
    let mut session = shared.lock().await;
    let import = session.bulk_import(&input.text)?;

    tracing::info!(
        session_key = %key,
        imported = import.workers.len(),
        rejected = import.rejected.len(),
        "Workers imported"
    );

    let mut response = SessionResponse::of(&mut session);
    response.import = Some(ImportSummary {
        imported: import.workers.len(),
        groups_created: import.groups.len(),
        rejected: import.rejected,
    });
    Ok(ok(response))
}

/// DELETE /api/v1/onboarding/sessions/{key}/workers/{index}
///
/// Workers mirrored from admins cannot be removed here.
pub async fn remove_worker(
    State(state): State<AppState>,
    Path((key, index)): Path<(String, usize)>,
) -> AppResult<impl IntoResponse> {
    let shared = state.registry.get(&key).await?;
    let mut session = shared.lock().await;
    session.remove_worker(index)?;
    Ok(ok(SessionResponse::of(&mut session)))
}

/// PUT /api/v1/onboarding/sessions/{key}/groups
///
/// Set an admin's or worker's group by name, reusing an existing group
/// whose name matches ignoring case.
pub async fn assign_group(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(input): Json<AssignGroupRequest>,
) -> AppResult<impl IntoResponse> {
    let shared = state.registry.get(&key).await?;
    let mut session = shared.lock().await;
    session.assign_group_by_name(input.section, input.index, &input.group_name)?;
    Ok(ok(SessionResponse::of(&mut session)))
}

/// POST /api/v1/onboarding/sessions/{key}/start-over
///
/// Discard user input and rebuild the form from the prefill record.
pub async fn start_over(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<impl IntoResponse> {
    let shared = state.registry.get(&key).await?;
    let mut session = shared.lock().await;
    session.start_over().await?;
    tracing::info!(session_key = %key, "Onboarding started over");
    Ok(ok(SessionResponse::of(&mut session)))
}

/// POST /api/v1/onboarding/sessions/{key}/save
///
/// Explicit checkpoint. `saved` is false when the draft store failed; the
/// session itself is unaffected.
pub async fn save(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<impl IntoResponse> {
    let shared = state.registry.get(&key).await?;
    let mut session = shared.lock().await;
    let saved = session.save().await;
    let mut response = SessionResponse::of(&mut session);
    response.saved = Some(saved);
    Ok(ok(response))
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// POST /api/v1/onboarding/sessions/{key}/advance
///
/// Validate the current step and move forward. 422 with field errors when
/// the step is incomplete.
pub async fn advance(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<impl IntoResponse> {
    let shared = state.registry.get(&key).await?;
    let mut session = shared.lock().await;
    let transition = session.go_next().await?;
    let mut response = SessionResponse::of(&mut session);
    response.transition = Some(transition);
    Ok(ok(response))
}

/// POST /api/v1/onboarding/sessions/{key}/decision
///
/// Answer a "now or later" step and move forward.
pub async fn decide(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(input): Json<DecisionRequest>,
) -> AppResult<impl IntoResponse> {
    let shared = state.registry.get(&key).await?;
    let mut session = shared.lock().await;
    let transition = session.decide(input.decision).await?;
    let mut response = SessionResponse::of(&mut session);
    response.transition = Some(transition);
    Ok(ok(response))
}

/// POST /api/v1/onboarding/sessions/{key}/go-back
///
/// Return to the previous step in the history. A no-op on the first and
/// last steps; 409 while a submission is in flight.
pub async fn go_back(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<impl IntoResponse> {
    let shared = state.registry.get(&key).await?;
    let mut session = shared.lock().await;
    let step = session.go_back()?;
    tracing::debug!(session_key = %key, step = %step, "Went back");
    Ok(ok(SessionResponse::of(&mut session)))
}

/// POST /api/v1/onboarding/sessions/{key}/submit
///
/// Deliver the final payload to the CRM. 502 when the CRM refuses it (the
/// session stays on the summary step), 409 while another submission of
/// the same session is running.
pub async fn submit(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<impl IntoResponse> {
    let transition = state.registry.submit(&key).await?;
    let shared = state.registry.get(&key).await?;
    let mut session = shared.lock().await;
    let mut response = SessionResponse::of(&mut session);
    response.transition = Some(transition);
    Ok(ok(response))
}
