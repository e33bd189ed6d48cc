//! Field-level provenance tracking.
//!
//! Every leaf path in the wizard state can carry a [`ProvenanceRecord`]
//! saying whether its value came from the CRM prefill and whether the user
//! has since changed it. Records are never removed during a session; the
//! final submission reports them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::{changed_paths, flatten_leaves, DiffStatus};
use crate::merge::is_valid_value;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where a field's value originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    Prefilled,
    UserInput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceRecord {
    pub original_value: Value,
    pub current_value: Value,
    pub source: FieldSource,
    pub was_edited: bool,
    /// Time of the most recent transition into the edited state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<Timestamp>,
}

/// A prefilled field whose value the user changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEdit {
    pub field: String,
    pub original: Value,
    pub new: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceSummary {
    pub prefilled_count: usize,
    pub edited_count: usize,
    pub edited_field_names: Vec<String>,
    pub changes_detail: Vec<FieldEdit>,
}

/// Provenance partitioned the way the CRM payload reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSplit {
    pub unchanged_prefilled: Vec<String>,
    pub edited_prefilled: Vec<FieldEdit>,
    pub user_entered: Vec<String>,
}

// ---------------------------------------------------------------------------
// ProvenanceState
// ---------------------------------------------------------------------------

/// Provenance for every tracked field path of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvenanceState {
    entries: BTreeMap<String, ProvenanceRecord>,
}

impl ProvenanceState {
    /// Record every non-empty leaf of the prefill seed as `prefilled`.
    pub fn initialize(seed: Option<&Value>) -> Self {
        let mut entries = BTreeMap::new();
        if let Some(seed) = seed {
            for (path, value) in flatten_leaves(seed) {
                if !is_valid_value(&value) {
                    continue;
                }
                entries.insert(
                    path,
                    ProvenanceRecord {
                        original_value: value.clone(),
                        current_value: value,
                        source: FieldSource::Prefilled,
                        was_edited: false,
                        edited_at: None,
                    },
                );
            }
        }
        Self { entries }
    }

    pub fn get(&self, path: &str) -> Option<&ProvenanceRecord> {
        self.entries.get(path)
    }

    pub fn is_prefilled(&self, path: &str) -> bool {
        self.entries
            .get(path)
            .is_some_and(|r| r.source == FieldSource::Prefilled)
    }

    pub fn is_edited(&self, path: &str) -> bool {
        self.entries.get(path).is_some_and(|r| r.was_edited)
    }

    /// Paths whose value came from the prefill seed.
    pub fn prefilled_paths(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .filter(|(_, r)| r.source == FieldSource::Prefilled)
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a new value for a field.
    ///
    /// Repeating a call with the same value never moves `edited_at`.
    pub fn record_change(&mut self, path: &str, new_value: Value, now: Timestamp) {
        match self.entries.get_mut(path) {
            None => {
                if !is_valid_value(&new_value) {
                    return;
                }
                self.entries.insert(
                    path.to_string(),
                    ProvenanceRecord {
                        original_value: Value::Null,
                        current_value: new_value,
                        source: FieldSource::UserInput,
                        was_edited: true,
                        edited_at: Some(now),
                    },
                );
            }
            Some(record) if record.source == FieldSource::Prefilled => {
                let now_edited = new_value != record.original_value;
                if now_edited && !record.was_edited {
                    record.edited_at = Some(now);
                }
                record.was_edited = now_edited;
                record.current_value = new_value;
            }
            Some(record) => {
                if record.current_value != new_value {
                    record.current_value = new_value;
                    record.edited_at = Some(now);
                }
            }
        }
    }

    /// Record every leaf that differs between two JSON snapshots of the
    /// state. Returns the number of leaves recorded.
    pub fn record_state_changes(&mut self, old: &Value, new: &Value, now: Timestamp) -> usize {
        let changes = changed_paths(old, new);
        for change in &changes {
            let value = match change.status {
                DiffStatus::Removed => Value::Null,
                _ => change.new.clone().unwrap_or(Value::Null),
            };
            self.record_change(&change.path, value, now);
        }
        changes.len()
    }

    /// Audit metadata for the final payload.
    pub fn summarize(&self) -> ProvenanceSummary {
        let prefilled: Vec<(&String, &ProvenanceRecord)> = self
            .entries
            .iter()
            .filter(|(_, r)| r.source == FieldSource::Prefilled)
            .collect();

        let edited: Vec<(&String, &ProvenanceRecord)> =
            prefilled.iter().copied().filter(|(_, r)| r.was_edited).collect();

        ProvenanceSummary {
            prefilled_count: prefilled.len(),
            edited_count: edited.len(),
            edited_field_names: edited.iter().map(|(p, _)| (*p).clone()).collect(),
            changes_detail: edited
                .iter()
                .map(|(p, r)| FieldEdit {
                    field: (*p).clone(),
                    original: r.original_value.clone(),
                    new: r.current_value.clone(),
                })
                .collect(),
        }
    }

    pub fn split_for_submission(&self) -> SubmissionSplit {
        let mut split = SubmissionSplit::default();
        for (path, record) in &self.entries {
            match (record.source, record.was_edited) {
                (FieldSource::Prefilled, false) => split.unchanged_prefilled.push(path.clone()),
                (FieldSource::Prefilled, true) => split.edited_prefilled.push(FieldEdit {
                    field: path.clone(),
                    original: record.original_value.clone(),
                    new: record.current_value.clone(),
                }),
                (FieldSource::UserInput, _) => {
                    if is_valid_value(&record.current_value) {
                        split.user_entered.push(path.clone());
                    }
                }
            }
        }
        split
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
