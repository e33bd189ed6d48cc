//! Persisted draft snapshot and its compatibility rules.
//!
//! A draft is the whole session serialized as one JSON value. Drafts carry
//! a schema version; a draft written by another version is not discarded
//! but salvaged section by section, with its step position recomputed from
//! the data.

use std::collections::BTreeSet;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::WizardState;
use crate::onboarding_wizard::{calculate_first_incomplete_step, OnboardingStep};
use crate::provenance::ProvenanceState;
use crate::types::Timestamp;

/// Bumped whenever the snapshot layout changes incompatibly.
pub const DRAFT_SCHEMA_VERSION: u32 = 3;

/// Drafts older than this are deleted on load.
pub const DRAFT_RETENTION_DAYS: i64 = 14;

/// Prefix of every draft slot key.
pub const DRAFT_KEY_PREFIX: &str = "onboarding_draft_";

/// Slot key for a session key (external record id or `local-<uuid>`).
pub fn slot_key(session_key: &str) -> String {
    format!("{DRAFT_KEY_PREFIX}{session_key}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub wizard_state: WizardState,
    pub current_step: OnboardingStep,
    pub navigation_history: Vec<OnboardingStep>,
    #[serde(default)]
    pub completed_steps: BTreeSet<OnboardingStep>,
    #[serde(default)]
    pub provenance: ProvenanceState,
    /// The raw prefill record, kept so "start over" works after a resume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefill_seed: Option<Value>,
    pub version: u32,
    pub saved_at: Timestamp,
    #[serde(default)]
    pub has_token: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_record_id: Option<String>,
    /// Whether the external record existed before this session started.
    #[serde(default)]
    pub created_externally: bool,
}

impl DraftSnapshot {
    /// Tag with the current schema version and save time.
    pub fn stamp(&mut self, now: Timestamp) {
        self.version = DRAFT_SCHEMA_VERSION;
        self.saved_at = now;
    }
}

/// Outcome of reading a stored draft value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedDraft {
    /// Written by this schema version; trusted as is.
    Current(DraftSnapshot),
    /// Written by another version. Step recomputed, history cleared.
    Salvaged(DraftSnapshot),
    /// Older than the retention window; the caller should delete it.
    Expired,
    /// Not a draft at all.
    Corrupt(String),
}

pub fn is_expired(saved_at: Timestamp, now: Timestamp, retention: Duration) -> bool {
    now - saved_at > retention
}

/// Decode a stored draft, applying expiry and version rules.
pub fn decode_draft(raw: &Value, now: Timestamp, retention: Duration) -> DecodedDraft {
    let Some(obj) = raw.as_object() else {
        return DecodedDraft::Corrupt("draft is not a JSON object".to_string());
    };

    let saved_at = match obj
        .get("savedAt")
        .cloned()
        .map(serde_json::from_value::<Timestamp>)
    {
        Some(Ok(ts)) => ts,
        Some(Err(e)) => return DecodedDraft::Corrupt(format!("invalid savedAt: {e}")),
        None => return DecodedDraft::Corrupt("missing savedAt".to_string()),
    };

    if is_expired(saved_at, now, retention) {
        return DecodedDraft::Expired;
    }

    let version = obj.get("version").and_then(Value::as_u64);
    if version == Some(u64::from(DRAFT_SCHEMA_VERSION)) {
        return match serde_json::from_value::<DraftSnapshot>(raw.clone()) {
            Ok(snapshot) => DecodedDraft::Current(snapshot),
            Err(e) => DecodedDraft::Corrupt(e.to_string()),
        };
    }

    match salvage(obj, saved_at) {
        Some(snapshot) => DecodedDraft::Salvaged(snapshot),
        None => DecodedDraft::Corrupt(format!(
            "draft version {version:?} has no usable wizard state"
        )),
    }
}

/// Keep every section of `wizardState` that still deserializes on its own.
pub fn salvage_state(raw: &Value) -> Option<WizardState> {
    let obj = raw.as_object()?;
    let mut usable = Map::new();
    for (key, value) in obj {
        let mut candidate = Map::new();
        candidate.insert(key.clone(), value.clone());
        if serde_json::from_value::<WizardState>(Value::Object(candidate)).is_ok() {
            usable.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(Value::Object(usable)).ok()
}

fn salvage(obj: &Map<String, Value>, saved_at: Timestamp) -> Option<DraftSnapshot> {
    let wizard_state = salvage_state(obj.get("wizardState")?)?;
    let current_step = calculate_first_incomplete_step(&wizard_state);

    let field = |key: &str| obj.get(key).cloned().unwrap_or(Value::Null);
    let provenance = serde_json::from_value(field("provenance")).unwrap_or_default();
    let prefill_seed = obj.get("prefillSeed").filter(|v| v.is_object()).cloned();
    let external_record_id = serde_json::from_value(field("externalRecordId")).unwrap_or(None);

    Some(DraftSnapshot {
        wizard_state,
        current_step,
        navigation_history: Vec::new(),
        completed_steps: BTreeSet::new(),
        provenance,
        prefill_seed,
        version: DRAFT_SCHEMA_VERSION,
        saved_at,
        has_token: field("hasToken").as_bool().unwrap_or(false),
        external_record_id,
        created_externally: field("createdExternally").as_bool().unwrap_or(false),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
