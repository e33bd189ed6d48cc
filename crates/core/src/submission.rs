//! Payload builders for the CRM webhook and the remote record store.
//!
//! Progress pings carry metadata only. The complete payload carries the full
//! form, the provenance report, and optionally a spreadsheet attachment.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::model::WizardState;
use crate::onboarding_wizard::{percent_complete, OnboardingStatus, OnboardingStep, TOTAL_STEPS};
use crate::provenance::{ProvenanceState, ProvenanceSummary, SubmissionSplit};
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrmAction {
    Crear,
    Actualizar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrmEventType {
    Progress,
    Complete,
}

impl CrmEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Complete => "complete",
        }
    }
}

/// A generated spreadsheet, base64-encoded for transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcelAttachment {
    pub filename: String,
    pub base64: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMetadata {
    pub step_index: u8,
    pub step_name: OnboardingStep,
    pub step_label: String,
    pub total_steps: u8,
    pub percent_complete: u8,
    pub empresa_nombre: String,
    pub empresa_rut: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionMetadata {
    pub has_token: bool,
    pub was_prefilled: bool,
    pub provenance: SubmissionSplit,
    pub summary: ProvenanceSummary,
    pub total_workers: usize,
    pub total_shifts: usize,
    pub total_schedules: usize,
    pub total_assignments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadMetadata {
    Complete(Box<CompletionMetadata>),
    Progress(ProgressMetadata),
}

/// Body posted to the CRM automation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmPayload {
    pub accion: CrmAction,
    pub event_type: CrmEventType,
    #[serde(rename = "id_zoho", default, skip_serializing_if = "Option::is_none")]
    pub id_zoho: Option<String>,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PayloadMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excel_file: Option<ExcelAttachment>,
}

/// Session facts shared by every payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionContext {
    pub external_record_id: Option<String>,
    /// The external record existed before the session started.
    pub created_externally: bool,
    pub has_token: bool,
    pub now: Timestamp,
}

impl SubmissionContext {
    fn action(&self) -> CrmAction {
        if self.created_externally {
            CrmAction::Actualizar
        } else {
            CrmAction::Crear
        }
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Metadata-only ping sent after each successful step transition.
pub fn build_progress_ping(
    ctx: &SubmissionContext,
    state: &WizardState,
    step: OnboardingStep,
) -> CrmPayload {
    CrmPayload {
        accion: ctx.action(),
        event_type: CrmEventType::Progress,
        id_zoho: ctx.external_record_id.clone(),
        timestamp: ctx.now,
        form_data: None,
        metadata: Some(PayloadMetadata::Progress(ProgressMetadata {
            step_index: step.index(),
            step_name: step,
            step_label: step.label().to_string(),
            total_steps: TOTAL_STEPS,
            percent_complete: percent_complete(step),
            empresa_nombre: state.company.razon_social.trim().to_string(),
            empresa_rut: state.company.rut.trim().to_string(),
        })),
        excel_file: None,
    }
}

/// Whether a spreadsheet should be generated for this state.
pub fn wants_spreadsheet(state: &WizardState) -> bool {
    !state.company.razon_social.trim().is_empty()
}

/// The final payload. `excel` is attached only when the company has a
/// legal name.
pub fn build_complete_payload(
    ctx: &SubmissionContext,
    state: &WizardState,
    provenance: &ProvenanceState,
    excel: Option<ExcelAttachment>,
) -> Result<CrmPayload, CoreError> {
    let summary = provenance.summarize();
    let metadata = CompletionMetadata {
        has_token: ctx.has_token,
        was_prefilled: summary.prefilled_count > 0,
        provenance: provenance.split_for_submission(),
        summary,
        total_workers: state.workers.len(),
        total_shifts: state.custom_shifts().count(),
        total_schedules: state.schedule_patterns.len(),
        total_assignments: state.assignments.iter().filter(|a| a.is_valid()).count(),
    };

    Ok(CrmPayload {
        accion: ctx.action(),
        event_type: CrmEventType::Complete,
        id_zoho: ctx.external_record_id.clone(),
        timestamp: ctx.now,
        form_data: Some(state.to_value()?),
        metadata: Some(PayloadMetadata::Complete(Box::new(metadata))),
        excel_file: excel.filter(|_| wants_spreadsheet(state)),
    })
}

// ---------------------------------------------------------------------------
// Record store
// ---------------------------------------------------------------------------

/// Body of the `PATCH /onboarding/{id}` progress save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPatch {
    pub form_data: Value,
    pub current_step: u8,
    pub navigation_history: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estado: Option<OnboardingStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

pub fn build_record_patch(
    state: &WizardState,
    step: OnboardingStep,
    history: &[OnboardingStep],
    completed_at: Option<Timestamp>,
) -> Result<RecordPatch, CoreError> {
    let estado = if completed_at.is_some() {
        OnboardingStatus::Completed
    } else {
        OnboardingStatus::InProgress
    };
    Ok(RecordPatch {
        form_data: state.to_value()?,
        current_step: step.index(),
        navigation_history: history.iter().map(|s| s.index()).collect(),
        estado: Some(estado),
        completed_at,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Admin, Worker};
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn ctx(created_externally: bool) -> SubmissionContext {
        SubmissionContext {
            external_record_id: Some("98765".into()),
            created_externally,
            has_token: true,
            now: Utc.with_ymd_and_hms(2024, 7, 1, 15, 30, 0).unwrap(),
        }
    }

    fn populated_state() -> WizardState {
        let mut state = WizardState::default();
        state.company.razon_social = "Andes SpA".into();
        state.company.rut = "76.086.428-5".into();
        state.admins.push(Admin {
            nombre: "Ana".into(),
            ..Default::default()
        });
        state.workers.push(Worker {
            nombre: "Luis".into(),
            ..Default::default()
        });
        state
    }

    fn attachment() -> ExcelAttachment {
        ExcelAttachment {
            filename: "onboarding.csv".into(),
            base64: "YQ==".into(),
            mime_type: "text/csv".into(),
        }
    }

    #[test]
    fn progress_ping_is_metadata_only() {
        let payload = build_progress_ping(&ctx(true), &populated_state(), OnboardingStep::Workers);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["accion"], "actualizar");
        assert_eq!(value["eventType"], "progress");
        assert_eq!(value["id_zoho"], "98765");
        assert_eq!(value["metadata"]["stepIndex"], 5);
        assert_eq!(value["metadata"]["stepName"], "workers");
        assert_eq!(value["metadata"]["totalSteps"], 12);
        assert_eq!(value["metadata"]["empresaNombre"], "Andes SpA");
        assert!(value.get("formData").is_none());
        let text = value.to_string();
        assert!(!text.contains("Luis"));
        assert!(!text.contains("Ana"));
    }

    #[test]
    fn complete_payload_carries_form_and_provenance() {
        let seed = json!({ "company": { "razonSocial": "Andes SpA" } });
        let mut provenance = ProvenanceState::initialize(Some(&seed));
        provenance.record_change("company.rut", json!("76.086.428-5"), ctx(false).now);

        let payload = build_complete_payload(
            &ctx(false),
            &populated_state(),
            &provenance,
            Some(attachment()),
        )
        .unwrap();
        assert_eq!(payload.accion, CrmAction::Crear);
        assert_eq!(payload.event_type, CrmEventType::Complete);
        assert_eq!(payload.form_data.as_ref().unwrap()["company"]["razonSocial"], "Andes SpA");
        assert_eq!(payload.excel_file, Some(attachment()));

        let metadata = assert_matches!(payload.metadata, Some(PayloadMetadata::Complete(m)) => m);
        assert!(metadata.was_prefilled);
        assert_eq!(metadata.provenance.unchanged_prefilled, vec!["company.razonSocial"]);
        assert_eq!(metadata.provenance.user_entered, vec!["company.rut"]);
        assert_eq!(metadata.total_workers, 1);
    }

    #[test]
    fn spreadsheet_dropped_without_legal_name() {
        let state = WizardState::default();
        let payload = build_complete_payload(
            &ctx(false),
            &state,
            &ProvenanceState::default(),
            Some(attachment()),
        )
        .unwrap();
        assert!(payload.excel_file.is_none());
    }

    #[test]
    fn record_patch_uses_step_indices() {
        let patch = build_record_patch(
            &populated_state(),
            OnboardingStep::Admin,
            &[OnboardingStep::Welcome, OnboardingStep::Company, OnboardingStep::Admin],
            None,
        )
        .unwrap();
        assert_eq!(patch.current_step, 3);
        assert_eq!(patch.navigation_history, vec![0, 2, 3]);
        assert_eq!(patch.estado, Some(OnboardingStatus::InProgress));

        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value["estado"], "en_progreso");
        assert!(value.get("completedAt").is_none());
    }
}
