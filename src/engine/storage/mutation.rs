//! Create/update planning for storage entries edited in the panel.
//!
//! Renaming a key is a remove of the old key followed by a set of the new one;
//! there is no atomic rename in the page's storage API.

use serde_json::Value;

use crate::storage::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageMutationInput {
    pub original_key: Option<String>,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageMutation {
    Set { key: String, value: String },
    Remove { key: String },
}

/// Normalizes raw form input: the key is trimmed and required, the original key is
/// trimmed and dropped when blank, and the value is stringified.
pub fn normalize_mutation_input(
    original_key: Option<&str>,
    key: &str,
    value: &Value,
) -> Result<StorageMutationInput, StorageError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(StorageError::KeyRequired);
    }

    let original_key = original_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string);

    Ok(StorageMutationInput {
        original_key,
        key: key.to_string(),
        value: stringify_value(value),
    })
}

pub fn plan_mutation(input: &StorageMutationInput) -> Vec<StorageMutation> {
    let mut operations = Vec::with_capacity(2);

    if let Some(original) = &input.original_key {
        if original != &input.key {
            operations.push(StorageMutation::Remove { key: original.clone() });
        }
    }

    operations.push(StorageMutation::Set {
        key: input.key.clone(),
        value: input.value.clone(),
    });
    operations
}

/// Storage values are strings; anything else is converted the way a page would store it.
pub(crate) fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_is_required_after_trim() {
        assert_eq!(
            normalize_mutation_input(None, "   ", &json!("v")),
            Err(StorageError::KeyRequired)
        );
    }

    #[test]
    fn value_is_stringified() {
        let input = normalize_mutation_input(Some("  "), " count ", &json!(42)).unwrap();
        assert_eq!(input.key, "count");
        assert_eq!(input.value, "42");
        assert_eq!(input.original_key, None);
    }

    #[test]
    fn rename_plans_remove_then_set() {
        let input = normalize_mutation_input(Some("old"), "new", &json!("v")).unwrap();
        assert_eq!(
            plan_mutation(&input),
            vec![
                StorageMutation::Remove { key: "old".into() },
                StorageMutation::Set { key: "new".into(), value: "v".into() },
            ]
        );
    }

    #[test]
    fn same_key_update_is_a_single_set() {
        let input = normalize_mutation_input(Some("k"), "k", &json!("v")).unwrap();
        assert_eq!(plan_mutation(&input).len(), 1);
    }
}
