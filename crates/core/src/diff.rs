//! Structural diff over the JSON form of the wizard state.
//!
//! The state is flattened to leaf paths (`company.rut`, `admins.0.email`)
//! and compared key-by-key. Arrays of objects are indexed per element;
//! arrays of scalars (e.g. `company.sistemaMarcaje`, `dias`) are one leaf.
//! Both the provenance tracker and the merge engine share this notion of a
//! "field path".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The status of an item in a diff comparison.
///
/// - `Added`     -- present only in the incoming/new side.
/// - `Removed`   -- present only in the current/old side.
/// - `Changed`   -- present in both sides but with different values.
/// - `Unchanged` -- present in both sides with identical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    Added,
    Removed,
    Changed,
    Unchanged,
}

impl DiffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Changed => "changed",
            Self::Unchanged => "unchanged",
        }
    }
}

impl std::fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One leaf-level difference between two states.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub path: String,
    pub status: DiffStatus,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// Join a parent path and a key.
pub fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// `true` if `path` equals `prefix` or lies beneath it.
pub fn path_is_within(path: &str, prefix: &str) -> bool {
    path == prefix
        || (path.len() > prefix.len()
            && path.starts_with(prefix)
            && path.as_bytes()[prefix.len()] == b'.')
}

fn is_object_array(items: &[Value]) -> bool {
    !items.is_empty() && items.iter().all(Value::is_object)
}

fn flatten_into(value: &Value, prefix: &str, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(child, &join_path(prefix, key), out);
            }
        }
        Value::Array(items) if is_object_array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten_into(child, &join_path(prefix, &i.to_string()), out);
            }
        }
        _ => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), value.clone());
            }
        }
    }
}

/// Flatten a JSON value into leaf path -> leaf value.
pub fn flatten_leaves(value: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into(value, "", &mut out);
    out
}

/// Compare two JSON documents leaf by leaf, returning only the leaves that
/// differ (added, removed, or changed).
pub fn changed_paths(old: &Value, new: &Value) -> Vec<FieldChange> {
    let old_leaves = flatten_leaves(old);
    let new_leaves = flatten_leaves(new);
    let mut changes = Vec::new();

    for (path, new_value) in &new_leaves {
        match old_leaves.get(path) {
            Some(old_value) if old_value == new_value => {}
            Some(old_value) => changes.push(FieldChange {
                path: path.clone(),
                status: DiffStatus::Changed,
                old: Some(old_value.clone()),
                new: Some(new_value.clone()),
            }),
            None => changes.push(FieldChange {
                path: path.clone(),
                status: DiffStatus::Added,
                old: None,
                new: Some(new_value.clone()),
            }),
        }
    }

    for (path, old_value) in &old_leaves {
        if !new_leaves.contains_key(path) {
            changes.push(FieldChange {
                path: path.clone(),
                status: DiffStatus::Removed,
                old: Some(old_value.clone()),
                new: None,
            });
        }
    }

    changes.sort_by(|a, b| a.path.cmp(&b.path));
    changes
}

/// Read the value at a dot path, descending through objects and arrays.
pub fn value_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Write `new_value` at a dot path. Intermediate objects and array
/// elements must already exist; returns `false` when the path is unreachable.
pub fn set_value_at(root: &mut Value, path: &str, new_value: Value) -> bool {
    let mut current = root;
    let segments: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    for segment in parents {
        current = match current {
            Value::Object(map) => match map.get_mut(*segment) {
                Some(next) => next,
                None => return false,
            },
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                Some(next) => next,
                None => return false,
            },
            _ => return false,
        };
    }

    match current {
        Value::Object(map) => {
            map.insert((*last).to_string(), new_value);
            true
        }
        Value::Array(items) => match last.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            Some(slot) => {
                *slot = new_value;
                true
            }
            None => false,
        },
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
