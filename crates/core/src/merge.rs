//! Merge engine for combining prefill seed, saved draft, and edits.
//!
//! The merge works on the JSON form of the state so that it can be applied
//! uniformly to any section. Rules, per key present in the override:
//!
//! 1. A valid override value (non-null, non-blank string, non-empty array or
//!    object) wins.
//! 2. Otherwise, if the key's path is prefilled and the base value is valid,
//!    the base value is kept (a populated field is never replaced by an
//!    empty one).
//! 3. Otherwise the override value is taken, even if empty.
//!
//! Nested objects recurse key by key. Arrays are a single leaf: replaced
//! only when the override array is non-empty.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::diff::{join_path, path_is_within};
use crate::error::CoreError;
use crate::model::WizardState;

/// Whether a JSON value counts as "populated".
pub fn is_valid_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// A path counts as prefilled when it, or any leaf beneath it, was seeded.
fn is_prefilled(prefilled: &BTreeSet<String>, path: &str) -> bool {
    if prefilled.contains(path) {
        return true;
    }
    prefilled
        .range(path.to_string()..)
        .take_while(|p| p.starts_with(path))
        .any(|p| path_is_within(p, path))
}

fn merge_objects(
    base: &Map<String, Value>,
    over: &Map<String, Value>,
    prefix: &str,
    prefilled: &BTreeSet<String>,
) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, over_value) in over {
        let path = join_path(prefix, key);
        let base_value = base.get(key);
        let value = merge_value(base_value, over_value, &path, prefilled);
        merged.insert(key.clone(), value);
    }
    merged
}

fn merge_value(
    base: Option<&Value>,
    over: &Value,
    path: &str,
    prefilled: &BTreeSet<String>,
) -> Value {
    match (base, over) {
        (Some(Value::Object(b)), Value::Object(o)) => {
            Value::Object(merge_objects(b, o, path, prefilled))
        }
        (Some(base_value), Value::Array(items)) => {
            if items.is_empty() {
                base_value.clone()
            } else {
                over.clone()
            }
        }
        _ if is_valid_value(over) => over.clone(),
        (Some(base_value), _) if is_prefilled(prefilled, path) && is_valid_value(base_value) => {
            base_value.clone()
        }
        _ => over.clone(),
    }
}

/// Merge `over` onto `base` honoring the anti-overwrite rule for
/// `prefilled` paths.
pub fn merge(base: &Value, over: &Value, prefilled: &BTreeSet<String>) -> Value {
    match (base, over) {
        (Value::Object(b), Value::Object(o)) => Value::Object(merge_objects(b, o, "", prefilled)),
        _ => merge_value(Some(base), over, "", prefilled),
    }
}

/// Typed wrapper over [`merge`] for whole wizard states.
pub fn merge_state(
    base: &WizardState,
    over: &Value,
    prefilled: &BTreeSet<String>,
) -> Result<WizardState, CoreError> {
    let merged = merge(&base.to_value()?, over, prefilled);
    WizardState::from_value(merged)
}

/// Rebuild the state from the prefill seed alone, discarding every draft
/// edit. Equivalent to merging the seed onto an empty state.
pub fn reset_to_seed(
    seed: Option<&Value>,
    prefilled: &BTreeSet<String>,
) -> Result<WizardState, CoreError> {
    let empty = WizardState::default();
    match seed {
        Some(seed) => merge_state(&empty, seed, prefilled),
        None => Ok(empty),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn valid_value_rules() {
        assert!(!is_valid_value(&json!(null)));
        assert!(!is_valid_value(&json!("   ")));
        assert!(!is_valid_value(&json!([])));
        assert!(!is_valid_value(&json!({})));
        assert!(is_valid_value(&json!(false)));
        assert!(is_valid_value(&json!(0)));
        assert!(is_valid_value(&json!("x")));
    }

    #[test]
    fn empty_override_keeps_prefilled_base() {
        let merged = merge(
            &json!({ "razonSocial": "Prefilled", "rubro": "Construcción" }),
            &json!({ "razonSocial": "", "rubro": "Construcción" }),
            &paths(&["razonSocial"]),
        );
        assert_eq!(
            merged,
            json!({ "razonSocial": "Prefilled", "rubro": "Construcción" })
        );
    }

    #[test]
    fn explicit_clear_honored_without_prefill() {
        let merged = merge(
            &json!({ "giro": "Retail" }),
            &json!({ "giro": "" }),
            &BTreeSet::new(),
        );
        assert_eq!(merged, json!({ "giro": "" }));
    }

    #[test]
    fn nested_objects_merge_per_subkey() {
        let base = json!({ "company": { "razonSocial": "A", "comuna": "Ñuñoa", "giro": "X" } });
        let over = json!({ "company": { "razonSocial": "B", "comuna": "" } });
        let merged = merge(&base, &over, &paths(&["company.comuna"]));
        assert_eq!(
            merged,
            json!({ "company": { "razonSocial": "B", "comuna": "Ñuñoa", "giro": "X" } })
        );
    }

    #[test]
    fn arrays_are_single_leaves() {
        let base = json!({ "admins": [ { "nombre": "Ana" } ], "workers": [] });
        let over = json!({ "admins": [], "workers": [ { "nombre": "Luis" } ] });
        let merged = merge(&base, &over, &BTreeSet::new());
        assert_eq!(merged["admins"], json!([ { "nombre": "Ana" } ]));
        assert_eq!(merged["workers"], json!([ { "nombre": "Luis" } ]));
    }

    #[test]
    fn prefilled_leaf_beneath_array_protects_the_array_path() {
        let set = paths(&["company.grupos.0.nombre"]);
        assert!(is_prefilled(&set, "company.grupos"));
        assert!(!is_prefilled(&set, "company.grup"));
    }

    #[test]
    fn merge_is_idempotent() {
        let base = json!({
            "company": { "razonSocial": "Pre", "rut": "", "giro": "G" },
            "admins": [ { "nombre": "Ana" } ],
            "loadWorkersNow": null
        });
        let over = json!({
            "company": { "razonSocial": "", "rut": "1-9", "giro": "" },
            "admins": [],
            "loadWorkersNow": true
        });
        let prefilled = paths(&["company.razonSocial"]);
        let once = merge(&base, &over, &prefilled);
        let twice = merge(&once, &over, &prefilled);
        assert_eq!(once, twice);
    }

    #[test]
    fn anti_overwrite_holds_for_every_prefilled_path() {
        let base = json!({ "company": { "a": "1", "b": "2", "c": "3" } });
        let over = json!({ "company": { "a": "", "b": null, "c": "" } });
        let prefilled = paths(&["company.a", "company.b", "company.c"]);
        let merged = merge(&base, &over, &prefilled);
        for key in ["a", "b", "c"] {
            assert_eq!(merged["company"][key], base["company"][key]);
        }
    }

    #[test]
    fn reset_to_seed_restores_prefill_only() {
        let seed = json!({ "company": { "razonSocial": "Seeded SpA" } });
        let prefilled = paths(&["company.razonSocial"]);
        let state = reset_to_seed(Some(&seed), &prefilled).unwrap();
        assert_eq!(state.company.razon_social, "Seeded SpA");
        assert!(state.company.giro.is_empty());
        assert_eq!(state.shifts.len(), 2);
        assert!(state.admins.is_empty());
    }

    #[test]
    fn reset_without_seed_is_empty_state() {
        let state = reset_to_seed(None, &BTreeSet::new()).unwrap();
        assert_eq!(state, WizardState::default());
    }
}
