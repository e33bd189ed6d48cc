//! The per-session context object.
//!
//! A [`WizardSession`] owns the working [`WizardState`], the [`Navigator`],
//! and the [`ProvenanceState`] for one onboarding. Field edits are recorded
//! for provenance and autosaved through a debounced writer; step
//! transitions checkpoint the draft immediately, patch the remote record in
//! the background, and publish a progress ping.
//!
//! Persistence and collaborator failures never discard in-memory state.
//! They are logged and surfaced as warnings, drained with
//! [`WizardSession::take_warnings`].

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use onboard_core::diff::set_value_at;
use onboard_core::draft::{DraftSnapshot, DRAFT_SCHEMA_VERSION};
use onboard_core::error::CoreError;
use onboard_core::merge::{merge_state, reset_to_seed};
use onboard_core::model::{Worker, WizardState};
use onboard_core::onboarding_wizard::{
    percent_complete, validate_path_to, Decision, NavigationError, Navigator, OnboardingStatus,
    OnboardingStep, Transition, TOTAL_STEPS,
};
use onboard_core::provenance::{ProvenanceState, ProvenanceSummary};
use onboard_core::roster::{
    self, parse_bulk_workers, sync_admin_mirrors, BulkImport, RosterSection,
};
use onboard_core::submission::{
    build_complete_payload, build_progress_ping, build_record_patch, wants_spreadsheet,
    CrmPayload, SubmissionContext,
};
use onboard_core::types::{new_id, Timestamp};
use onboard_core::validation::incomplete_schedule_warnings;
use onboard_db::{DebouncedDraftWriter, DraftStore, LoadedDraft};
use onboard_events::prefill::seed_from_record;
use onboard_events::{CrmSink, ProgressEvent};
use serde::Serialize;
use serde_json::Value;

use crate::context::{Collaborators, SessionSettings};
use crate::error::SessionError;
use crate::token::EntryToken;

const WARN_DRAFT_NOT_SAVED: &str =
    "No se pudo guardar el borrador; los cambios se mantienen en esta sesión";
const WARN_DRAFT_NOT_READ: &str = "No se pudo leer el borrador guardado";
const WARN_DRAFT_SALVAGED: &str =
    "El borrador guardado era de una versión anterior y se recuperó parcialmente";
const WARN_PREFILL_FAILED: &str = "No se pudo cargar la información precargada";
const WARN_RECORD_FAILED: &str = "No se pudo recuperar el avance guardado";
const WARN_DRAFT_NOT_CLEARED: &str = "El borrador no pudo eliminarse tras el envío";

// ---------------------------------------------------------------------------
// Requests and views
// ---------------------------------------------------------------------------

/// How a session is entered.
#[derive(Debug, Clone, Default)]
pub struct OpenRequest {
    /// Token from a CRM link.
    pub token: Option<String>,
    /// Key of a previously opened session to resume.
    pub session_key: Option<String>,
}

/// Read-only projection of a session for clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_key: String,
    pub current_step: OnboardingStep,
    pub step_index: u8,
    pub step_label: &'static str,
    pub total_steps: u8,
    pub percent_complete: u8,
    pub navigation_history: Vec<OnboardingStep>,
    pub completed_steps: BTreeSet<OnboardingStep>,
    pub can_go_back: bool,
    pub state: WizardState,
    pub prefilled_fields: BTreeSet<String>,
    pub provenance: ProvenanceSummary,
    /// Workers still without a valid assignment, offered by the assignment
    /// step's selector.
    pub assignable_worker_ids: Vec<String>,
    pub has_token: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Submission guard
// ---------------------------------------------------------------------------

/// Holds the in-flight flag for as long as it lives.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A built final payload waiting to be delivered.
///
/// Delivery does not need the session, so the registry can release the
/// session lock while the CRM call is in progress.
pub struct PendingSubmission {
    guard: InFlight,
    payload: CrmPayload,
    crm: Arc<dyn CrmSink>,
    /// Navigation at the moment the payload was built.
    navigator: Navigator,
}

impl PendingSubmission {
    pub fn payload(&self) -> &CrmPayload {
        &self.payload
    }

    pub async fn deliver(self) -> Result<DeliveredSubmission, SessionError> {
        if let Err(e) = self.crm.send(&self.payload).await {
            tracing::error!(
                record_id = ?self.payload.id_zoho,
                error = %e,
                "Final submission failed, state kept for retry"
            );
            return Err(SessionError::Submission(e));
        }
        Ok(DeliveredSubmission {
            guard: self.guard,
            submitted_at: self.payload.timestamp,
            navigator: self.navigator,
        })
    }
}

/// Proof that the CRM accepted the payload.
pub struct DeliveredSubmission {
    guard: InFlight,
    submitted_at: Timestamp,
    navigator: Navigator,
}

// ---------------------------------------------------------------------------
// WizardSession
// ---------------------------------------------------------------------------

pub struct WizardSession {
    key: String,
    state: WizardState,
    navigator: Navigator,
    provenance: ProvenanceState,
    /// The raw prefill record. "Start over" rebuilds from it.
    prefill_seed: Option<Value>,
    has_token: bool,
    external_record_id: Option<String>,
    created_externally: bool,
    completed_at: Option<Timestamp>,
    store: DraftStore,
    /// `None` once the session is closed; saves then go straight to the store.
    writer: Option<DebouncedDraftWriter>,
    collaborators: Collaborators,
    submitting: Arc<AtomicBool>,
    warnings: Vec<String>,
}

impl std::fmt::Debug for WizardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardSession")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl WizardSession {
    /// The key a request resolves to without generating one, if any.
    pub fn key_for(request: &OpenRequest) -> Option<String> {
        request.session_key.clone().or_else(|| {
            request
                .token
                .as_deref()
                .and_then(EntryToken::parse)
                .map(|t| t.session_key())
        })
    }

    fn blank(
        key: String,
        store: DraftStore,
        collaborators: Collaborators,
        settings: &SessionSettings,
    ) -> Self {
        let writer = DebouncedDraftWriter::spawn(store.clone(), key.clone(), settings.debounce);
        Self {
            key,
            state: WizardState::default(),
            navigator: Navigator::new(),
            provenance: ProvenanceState::default(),
            prefill_seed: None,
            has_token: false,
            external_record_id: None,
            created_externally: false,
            completed_at: None,
            store,
            writer: Some(writer),
            collaborators,
            submitting: Arc::new(AtomicBool::new(false)),
            warnings: Vec::new(),
        }
    }

    /// Open a session.
    ///
    /// A saved draft wins. Without one, a record-id token loads the remote
    /// record and an encrypted token is resolved to a prefill seed. Any
    /// collaborator failure degrades to an empty form.
    pub async fn open(
        request: OpenRequest,
        store: DraftStore,
        collaborators: Collaborators,
        settings: &SessionSettings,
    ) -> Result<Self, SessionError> {
        let entry = request.token.as_deref().and_then(EntryToken::parse);
        let key = Self::key_for(&request).unwrap_or_else(|| format!("local-{}", new_id()));

        let mut session = Self::blank(key, store, collaborators, settings);
        session.has_token = entry.is_some();
        if let Some(EntryToken::RecordId(id)) = &entry {
            session.external_record_id = Some(id.clone());
            session.created_externally = true;
        }

        let draft = match session.store.load(&session.key).await {
            Ok(draft) => draft,
            Err(e) => {
                tracing::error!(session_key = %session.key, error = %e, "Draft read failed");
                session.warnings.push(WARN_DRAFT_NOT_READ.to_string());
                None
            }
        };

        match (draft, entry) {
            (Some(loaded), _) => session.restore(loaded)?,
            (None, Some(EntryToken::RecordId(id))) => session.load_record(&id).await?,
            (None, Some(EntryToken::Encrypted(token))) => session.load_prefill(&token).await?,
            (None, None) => {}
        }

        tracing::info!(
            session_key = %session.key,
            step = %session.navigator.current(),
            has_token = session.has_token,
            prefilled = session.provenance.len(),
            "Onboarding session opened"
        );
        Ok(session)
    }

    /// Reopen a session from its draft alone. `Ok(None)` when no draft
    /// exists under `key`.
    pub async fn resume(
        key: &str,
        store: DraftStore,
        collaborators: Collaborators,
        settings: &SessionSettings,
    ) -> Result<Option<Self>, SessionError> {
        let Some(loaded) = store.load(key).await? else {
            return Ok(None);
        };
        let mut session = Self::blank(key.to_string(), store, collaborators, settings);
        session.restore(loaded)?;
        Ok(Some(session))
    }

    fn restore(&mut self, loaded: LoadedDraft) -> Result<(), SessionError> {
        let LoadedDraft { snapshot, salvaged } = loaded;
        let prefilled = snapshot.provenance.prefilled_paths();

        // The draft is merged over the seed so that blanks in an older
        // draft never hide prefilled values.
        let state = match &snapshot.prefill_seed {
            Some(seed) => {
                let base = reset_to_seed(Some(seed), &prefilled)?;
                merge_state(&base, &snapshot.wizard_state.to_value()?, &prefilled)?
            }
            None => snapshot.wizard_state,
        };

        let mut navigator = Navigator::resume(
            &state,
            Some(snapshot.current_step),
            &snapshot.navigation_history,
        );
        navigator.mark_completed(snapshot.completed_steps);

        self.state = state;
        self.navigator = navigator;
        self.provenance = snapshot.provenance;
        self.prefill_seed = snapshot.prefill_seed;
        self.has_token |= snapshot.has_token;
        self.external_record_id = snapshot.external_record_id.or(self.external_record_id.take());
        self.created_externally = snapshot.created_externally;

        if salvaged {
            self.warnings.push(WARN_DRAFT_SALVAGED.to_string());
        }
        tracing::info!(
            session_key = %self.key,
            step = %self.navigator.current(),
            salvaged,
            "Draft restored"
        );
        Ok(())
    }

    async fn load_record(&mut self, record_id: &str) -> Result<(), SessionError> {
        match self.collaborators.record_store.fetch(record_id).await {
            Ok(Some(record)) => {
                let seed = record.form_data.as_ref().and_then(seed_from_record);
                let saved_step = record.step();
                let has_progress = saved_step.is_some() || seed.is_some();
                let completed = record
                    .estado
                    .as_deref()
                    .and_then(|e| OnboardingStatus::from_str_db(e).ok())
                    == Some(OnboardingStatus::Completed);
                self.apply_seed(seed)?;
                if completed {
                    tracing::info!(record_id, "Remote record already completed");
                    self.navigator = Navigator::finished(&self.state);
                } else if has_progress {
                    self.navigator = Navigator::resume(&self.state, saved_step, &record.history());
                }
                tracing::info!(
                    record_id,
                    step = %self.navigator.current(),
                    "Remote record loaded"
                );
            }
            Ok(None) => {
                tracing::info!(record_id, "No remote record, starting empty");
            }
            Err(e) => {
                tracing::warn!(record_id, error = %e, "Remote record fetch failed");
                self.warnings.push(WARN_RECORD_FAILED.to_string());
            }
        }
        Ok(())
    }

    async fn load_prefill(&mut self, token: &str) -> Result<(), SessionError> {
        match self.collaborators.prefill.resolve(token).await {
            Ok(Some(seed)) => self.apply_seed(Some(seed))?,
            Ok(None) => {
                tracing::warn!(session_key = %self.key, "Prefill token yielded no data");
            }
            Err(e) => {
                tracing::warn!(session_key = %self.key, error = %e, "Prefill resolution failed");
                self.warnings.push(WARN_PREFILL_FAILED.to_string());
            }
        }
        Ok(())
    }

    fn apply_seed(&mut self, seed: Option<Value>) -> Result<(), SessionError> {
        self.provenance = ProvenanceState::initialize(seed.as_ref());
        let mut state = reset_to_seed(seed.as_ref(), &self.provenance.prefilled_paths())?;
        state.workers = sync_admin_mirrors(&state.admins, &state.workers);
        self.state = state;
        self.prefill_seed = seed;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn current_step(&self) -> OnboardingStep {
        self.navigator.current()
    }

    pub fn provenance(&self) -> &ProvenanceState {
        &self.provenance
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Drain warnings produced since the last call.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    pub fn view(&self) -> SessionView {
        let step = self.navigator.current();
        SessionView {
            session_key: self.key.clone(),
            current_step: step,
            step_index: step.index(),
            step_label: step.label(),
            total_steps: TOTAL_STEPS,
            percent_complete: percent_complete(step),
            navigation_history: self.navigator.history().to_vec(),
            completed_steps: self.navigator.completed().clone(),
            can_go_back: self.navigator.can_go_back(),
            state: self.state.clone(),
            prefilled_fields: self.provenance.prefilled_paths(),
            provenance: self.provenance.summarize(),
            assignable_worker_ids: roster::assignable_workers(
                &self.state.workers,
                &self.state.assignments,
            )
            .into_iter()
            .map(|w| w.id.clone())
            .collect(),
            has_token: self.has_token,
            external_record_id: self.external_record_id.clone(),
            completed_at: self.completed_at,
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn snapshot(&self) -> DraftSnapshot {
        DraftSnapshot {
            wizard_state: self.state.clone(),
            current_step: self.navigator.current(),
            navigation_history: self.navigator.history().to_vec(),
            completed_steps: self.navigator.completed().clone(),
            provenance: self.provenance.clone(),
            prefill_seed: self.prefill_seed.clone(),
            version: DRAFT_SCHEMA_VERSION,
            saved_at: Utc::now(),
            has_token: self.has_token,
            external_record_id: self.external_record_id.clone(),
            created_externally: self.created_externally,
        }
    }

    /// Queue a debounced autosave.
    fn schedule_save(&mut self) {
        let Some(writer) = &self.writer else {
            tracing::debug!(session_key = %self.key, "Session closed, autosave skipped");
            return;
        };
        if let Err(e) = writer.request(self.snapshot()) {
            tracing::error!(session_key = %self.key, error = %e, "Autosave request failed");
            self.warnings.push(WARN_DRAFT_NOT_SAVED.to_string());
        }
    }

    /// Write the draft now. Returns whether it was persisted.
    async fn save_now(&mut self) -> bool {
        let snapshot = self.snapshot();
        let outcome = match &self.writer {
            Some(writer) => writer.save_now(snapshot).await,
            None => self.store.save(&self.key, snapshot).await.map(|_| ()),
        };
        match outcome {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(session_key = %self.key, error = %e, "Draft save failed");
                self.warnings.push(WARN_DRAFT_NOT_SAVED.to_string());
                false
            }
        }
    }

    /// Explicit save checkpoint.
    pub async fn save(&mut self) -> bool {
        self.save_now().await
    }

    /// Patch the remote record without waiting for the outcome.
    fn spawn_record_patch(&self, completed_at: Option<Timestamp>) {
        let Some(record_id) = self.external_record_id.clone() else {
            return;
        };
        let patch = match build_record_patch(
            &self.state,
            self.navigator.current(),
            self.navigator.history(),
            completed_at,
        ) {
            Ok(patch) => patch,
            Err(e) => {
                tracing::error!(record_id = %record_id, error = %e, "Could not build record patch");
                return;
            }
        };
        let store = Arc::clone(&self.collaborators.record_store);
        tokio::spawn(async move {
            if let Err(e) = store.patch(&record_id, &patch).await {
                tracing::warn!(record_id = %record_id, error = %e, "Remote progress save failed");
            }
        });
    }

    fn context(&self, now: Timestamp) -> SubmissionContext {
        SubmissionContext {
            external_record_id: self.external_record_id.clone(),
            created_externally: self.created_externally,
            has_token: self.has_token,
            now,
        }
    }

    fn publish_progress(&self, step: OnboardingStep) {
        let ping = build_progress_ping(&self.context(Utc::now()), &self.state, step);
        self.collaborators
            .events
            .publish(ProgressEvent::new(self.key.clone(), ping));
    }

    /// Flush pending autosaves and stop the writer task.
    pub async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(writer) = self.writer.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    fn ensure_editable(&self) -> Result<(), SessionError> {
        if self.navigator.current().is_terminal() {
            return Err(NavigationError::Terminal.into());
        }
        if self.is_submitting() {
            return Err(SessionError::SubmissionInFlight);
        }
        Ok(())
    }

    /// Install `next` as the working state, recording provenance against
    /// `before` and regenerating admin mirrors.
    fn commit(&mut self, before: &Value, mut next: WizardState) -> Result<usize, SessionError> {
        let after = next.to_value()?;
        let changed = self
            .provenance
            .record_state_changes(before, &after, Utc::now());
        next.workers = sync_admin_mirrors(&next.admins, &next.workers);
        self.state = next;
        self.schedule_save();
        Ok(changed)
    }

    /// Set one field by dot path (`company.rut`, `admins.0.email`, or a
    /// whole section such as `admins`).
    pub fn update_field(&mut self, path: &str, value: Value) -> Result<(), SessionError> {
        self.ensure_editable()?;
        let before = self.state.to_value()?;
        let mut after = before.clone();
        if !set_value_at(&mut after, path, value) {
            return Err(CoreError::NotFound {
                entity: "field",
                key: path.to_string(),
            }
            .into());
        }
        let next = WizardState::from_value(after)
            .map_err(|e| CoreError::Validation(format!("Invalid value for {path}: {e}")))?;
        let changed = self.commit(&before, next)?;
        tracing::debug!(session_key = %self.key, path, changed, "Field updated");
        Ok(())
    }

    /// Replace the whole working state.
    pub fn replace_state(&mut self, next: WizardState) -> Result<(), SessionError> {
        self.ensure_editable()?;
        let before = self.state.to_value()?;
        let changed = self.commit(&before, next)?;
        tracing::debug!(session_key = %self.key, changed, "State replaced");
        Ok(())
    }

    /// Parse pasted worker rows and append the accepted ones.
    pub fn bulk_import(&mut self, text: &str) -> Result<BulkImport, SessionError> {
        self.ensure_editable()?;
        let import = parse_bulk_workers(text, &self.state.company.grupos);
        let before = self.state.to_value()?;
        let mut next = self.state.clone();
        next.company.grupos = import.groups.clone();
        next.workers.extend(import.workers.iter().cloned());
        self.commit(&before, next)?;
        tracing::info!(
            session_key = %self.key,
            imported = import.workers.len(),
            rejected = import.rejected.len(),
            groups = import.groups.len(),
            "Bulk worker import"
        );
        Ok(import)
    }

    /// Remove a regular worker row. Admin mirrors are refused.
    pub fn remove_worker(&mut self, index: usize) -> Result<Worker, SessionError> {
        self.ensure_editable()?;
        let before = self.state.to_value()?;
        let mut next = self.state.clone();
        let removed = roster::remove_worker(&mut next.workers, index)?;
        self.commit(&before, next)?;
        Ok(removed)
    }

    /// Set the group of an admin or worker from a typed group name. An
    /// existing group with the same name (ignoring case) is reused.
    pub fn assign_group_by_name(
        &mut self,
        section: RosterSection,
        index: usize,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        self.ensure_editable()?;
        let before = self.state.to_value()?;
        let mut next = self.state.clone();
        let group_id = roster::assign_group_by_name(&mut next, section, index, name)?;
        self.commit(&before, next)?;
        tracing::debug!(session_key = %self.key, ?section, index, group_id = ?group_id, "Group assigned");
        Ok(group_id)
    }

    /// Discard every edit and return to the first step with the original
    /// prefill. Fields that were never prefilled end up empty.
    pub async fn start_over(&mut self) -> Result<(), SessionError> {
        self.ensure_editable()?;
        let before = self.state.to_value()?;
        let prefilled = self.provenance.prefilled_paths();
        let mut next = reset_to_seed(self.prefill_seed.as_ref(), &prefilled)?;
        next.workers = sync_admin_mirrors(&next.admins, &next.workers);
        self.provenance
            .record_state_changes(&before, &next.to_value()?, Utc::now());
        self.state = next;
        self.navigator = Navigator::new();
        self.save_now().await;
        tracing::info!(session_key = %self.key, "Session started over");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Validate the current step and advance.
    ///
    /// On success the draft is checkpointed, the remote record is patched
    /// in the background, and a progress ping is published. A failed save
    /// does not undo the move.
    pub async fn go_next(&mut self) -> Result<Transition, SessionError> {
        if self.is_submitting() {
            return Err(SessionError::SubmissionInFlight);
        }
        let transition = match self.navigator.go_next(&self.state) {
            Ok(transition) => transition,
            Err(e) => {
                tracing::debug!(session_key = %self.key, error = %e, "Step not advanced");
                return Err(e.into());
            }
        };
        if transition.from == OnboardingStep::Schedules {
            self.warnings
                .extend(incomplete_schedule_warnings(&self.state.schedule_patterns));
        }

        tracing::info!(
            session_key = %self.key,
            from = %transition.from,
            to = %transition.to,
            skipped = ?transition.skipped,
            "Step advanced"
        );

        self.save_now().await;
        self.spawn_record_patch(None);
        self.publish_progress(transition.to);
        Ok(transition)
    }

    /// Record the answer at a decision step and advance.
    pub async fn decide(&mut self, decision: Decision) -> Result<Transition, SessionError> {
        self.ensure_editable()?;
        let step = self.navigator.current();
        let before = self.state.to_value()?;
        let mut next = self.state.clone();
        match step {
            OnboardingStep::LoadWorkersDecision => next.load_workers_now = Some(decision.is_now()),
            OnboardingStep::ConfigureDecision => {
                next.configure_shifts_now = Some(decision.is_now())
            }
            other => return Err(SessionError::NotADecisionStep(other)),
        }
        self.commit(&before, next)?;
        self.go_next().await
    }

    /// Return to the previous step. Refused while a submission is in
    /// flight.
    pub fn go_back(&mut self) -> Result<OnboardingStep, SessionError> {
        if self.is_submitting() {
            return Err(SessionError::SubmissionInFlight);
        }
        let before = self.navigator.current();
        let step = self.navigator.go_back();
        if step != before {
            self.schedule_save();
        }
        Ok(step)
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Build the final payload and take the in-flight flag.
    ///
    /// Every gate on the way to the summary is checked again, so a session
    /// resumed from an inconsistent record cannot submit an incomplete form.
    pub fn prepare_submission(&mut self) -> Result<PendingSubmission, SessionError> {
        if self.navigator.current() != OnboardingStep::Summary {
            return Err(NavigationError::NotAtStep(OnboardingStep::Summary).into());
        }
        let guard = InFlight::acquire(&self.submitting).ok_or(SessionError::SubmissionInFlight)?;
        if let Err(e) = validate_path_to(OnboardingStep::Summary, &self.state) {
            tracing::warn!(session_key = %self.key, error = %e, "Submission refused, form incomplete");
            return Err(e.into());
        }

        let now = Utc::now();
        let excel = if wants_spreadsheet(&self.state) {
            match self.collaborators.exporter.export(&self.state, now) {
                Ok(file) => Some(file),
                Err(e) => {
                    tracing::warn!(session_key = %self.key, error = %e, "Spreadsheet export failed");
                    None
                }
            }
        } else {
            None
        };

        let payload =
            build_complete_payload(&self.context(now), &self.state, &self.provenance, excel)?;
        Ok(PendingSubmission {
            guard,
            payload,
            crm: Arc::clone(&self.collaborators.crm),
            navigator: self.navigator.clone(),
        })
    }

    /// Move to the thank-you step and drop the draft after the CRM accepted
    /// the payload.
    pub async fn complete_submission(
        &mut self,
        delivered: DeliveredSubmission,
    ) -> Result<Transition, SessionError> {
        let DeliveredSubmission {
            guard,
            submitted_at,
            navigator,
        } = delivered;

        // The payload is already accepted; finish from where it was built.
        if self.navigator.current() != OnboardingStep::Summary {
            tracing::warn!(
                session_key = %self.key,
                step = %self.navigator.current(),
                "Session moved during delivery, finishing from the summary"
            );
            self.navigator = navigator;
        }
        let transition = self.navigator.finish()?;
        self.completed_at = Some(submitted_at);

        // Pending autosaves must land before the draft is removed.
        if let Some(writer) = &self.writer {
            if let Err(e) = writer.flush().await {
                tracing::error!(session_key = %self.key, error = %e, "Autosave flush failed");
            }
        }
        if let Err(e) = self.store.clear(&self.key).await {
            tracing::error!(session_key = %self.key, error = %e, "Draft clear failed");
            self.warnings.push(WARN_DRAFT_NOT_CLEARED.to_string());
        }
        self.spawn_record_patch(Some(submitted_at));
        drop(guard);

        tracing::info!(
            session_key = %self.key,
            record_id = ?self.external_record_id,
            "Onboarding submitted"
        );
        Ok(transition)
    }

    /// Prepare, deliver, and complete in one call while holding the session.
    pub async fn submit(&mut self) -> Result<Transition, SessionError> {
        let pending = self.prepare_submission()?;
        let delivered = pending.deliver().await?;
        self.complete_submission(delivered).await
    }
}
