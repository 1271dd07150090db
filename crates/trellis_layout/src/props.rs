// SPDX-License-Identifier: MIT OR Apache-2.0
//! Partial option updates with change detection.

use crate::error::{LayoutError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// One option whose value changed
#[derive(Debug, Clone, PartialEq)]
pub struct PropChange {
    /// Option key, as spelled in JSON
    pub key: String,
    /// Previous value
    pub old: Value,
    /// New value
    pub new: Value,
}

impl PropChange {
    /// Absolute numeric difference, when both values are numbers
    pub fn numeric_delta(&self) -> Option<f64> {
        Some((self.new.as_f64()? - self.old.as_f64()?).abs())
    }
}

/// Merge `patch` (a partial JSON object) into `current`.
///
/// Returns the merged options and the keys whose value actually changed.
/// Unknown keys are rejected so repeated patches stay idempotent.
pub fn merge_props<T>(current: &T, patch: &Value) -> Result<(T, Vec<PropChange>)>
where
    T: Serialize + DeserializeOwned,
{
    let Value::Object(patch) = patch else {
        return Err(LayoutError::InvalidProps(format!(
            "expected an object, got {}",
            patch
        )));
    };
    let Value::Object(mut merged) = serde_json::to_value(current)? else {
        return Err(LayoutError::InvalidProps(
            "options do not serialize to an object".into(),
        ));
    };

    let mut changes = Vec::new();
    for (key, new) in patch {
        let Some(old) = merged.get(key) else {
            return Err(LayoutError::InvalidProps(format!("unknown option `{}`", key)));
        };
        if !same_value(old, new) {
            changes.push(PropChange {
                key: key.clone(),
                old: old.clone(),
                new: new.clone(),
            });
            merged.insert(key.clone(), new.clone());
        }
    }

    let options = serde_json::from_value(Value::Object(merged))?;
    Ok((options, changes))
}

/// Default recompute policy: any change recomputes
pub fn any_change(changes: &[PropChange]) -> bool {
    !changes.is_empty()
}

fn same_value(old: &Value, new: &Value) -> bool {
    match (old.as_f64(), new.as_f64()) {
        (Some(old), Some(new)) => old == new,
        _ => old == new,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    struct Options {
        gap: f64,
        node_size: f64,
        name: String,
    }

    impl Default for Options {
        fn default() -> Self {
            Self {
                gap: 10.0,
                node_size: 20.0,
                name: "a".into(),
            }
        }
    }

    #[test]
    fn test_merge_reports_changes() {
        let (merged, changes) =
            merge_props(&Options::default(), &json!({"gap": 12, "nodeSize": 20})).unwrap();
        assert_eq!(merged.gap, 12.0);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].key, "gap");
        assert_eq!(changes[0].numeric_delta(), Some(2.0));
    }

    #[test]
    fn test_same_values_are_idempotent() {
        let (merged, _) = merge_props(&Options::default(), &json!({"name": "b"})).unwrap();
        let (_, changes) = merge_props(&merged, &json!({"name": "b"})).unwrap();
        assert!(!any_change(&changes));
    }

    #[test]
    fn test_rejects_bad_patches() {
        assert!(matches!(
            merge_props(&Options::default(), &json!([1, 2])),
            Err(LayoutError::InvalidProps(_))
        ));
        assert!(matches!(
            merge_props(&Options::default(), &json!({"bogus": 1})),
            Err(LayoutError::InvalidProps(_))
        ));
        assert!(matches!(
            merge_props(&Options::default(), &json!({"gap": "wide"})),
            Err(LayoutError::PropsJson(_))
        ));
    }
}
