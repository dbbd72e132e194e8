//! List views over storage entries fetched from a page.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::storage::mutation::stringify_value;
use crate::storage::{StorageEntry, StorageScope};

const ROOT_NAMESPACE: &str = "root";

/// Extracts the `items` list from a GET_ALL response body. Anything unexpected yields an
/// empty list; entries without a string key are dropped.
pub fn normalize_storage_entries(data: &Value) -> Vec<StorageEntry> {
    let Some(items) = data.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            let key = obj.get("key").and_then(Value::as_str).unwrap_or_default();
            if key.is_empty() {
                return None;
            }
            let value = obj.get("value").map(stringify_value).unwrap_or_default();
            Some(StorageEntry::new(key, value))
        })
        .collect()
}

pub fn sort_storage_entries(entries: &[StorageEntry]) -> Vec<StorageEntry> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));
    sorted
}

/// Pinned entries first, then by key.
pub fn sort_storage_entries_by_pinned(
    entries: &[StorageEntry],
    is_pinned: impl Fn(&StorageEntry) -> bool,
) -> Vec<StorageEntry> {
    let mut sorted = sort_storage_entries(entries);
    sorted.sort_by_key(|e| !is_pinned(e));
    sorted
}

/// Pin identity of a storage entry: `<area>:<origin>:<key>`.
pub fn storage_pin_key(area: StorageScope, origin: &str, key: &str) -> String {
    format!("{area}:{origin}:{key}")
}

/// Case-insensitive match on key or value. A blank term keeps everything.
pub fn filter_storage_entries(entries: &[StorageEntry], search_term: &str) -> Vec<StorageEntry> {
    let needle = search_term.trim().to_lowercase();
    if needle.is_empty() {
        return entries.to_vec();
    }

    entries
        .iter()
        .filter(|e| e.key.to_lowercase().contains(&needle) || e.value.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Groups entries by the prefix before the first `:` (or, failing that, the first `.`).
/// Keys with neither separator land in `root`.
pub fn group_storage_entries_by_namespace(entries: &[StorageEntry]) -> BTreeMap<String, Vec<StorageEntry>> {
    let mut groups: BTreeMap<String, Vec<StorageEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(namespace_of(&entry.key).to_string()).or_default().push(entry.clone());
    }
    groups
}

fn namespace_of(key: &str) -> &str {
    let prefix = key
        .split_once(':')
        .or_else(|| key.split_once('.'))
        .map(|(prefix, _)| prefix);

    match prefix {
        Some(p) if !p.is_empty() => p,
        _ => ROOT_NAMESPACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(k: &str, v: &str) -> StorageEntry {
        StorageEntry::new(k, v)
    }

    #[test]
    fn normalizes_response_items() {
        let data = json!({
            "origin": "https://example.com",
            "items": [
                { "key": "a", "value": "1" },
                { "key": "n", "value": 7 },
                { "key": "", "value": "x" },
                { "value": "no key" },
                null,
            ]
        });
        assert_eq!(normalize_storage_entries(&data), vec![entry("a", "1"), entry("n", "7")]);
        assert!(normalize_storage_entries(&json!({ "items": "nope" })).is_empty());
        assert!(normalize_storage_entries(&Value::Null).is_empty());
    }

    #[test]
    fn pinned_entries_sort_first() {
        let entries = vec![entry("c", ""), entry("a", ""), entry("b", "")];
        let sorted = sort_storage_entries_by_pinned(&entries, |e| e.key == "c");
        let keys: Vec<_> = sorted.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["c", "a", "b"]);

        let keys: Vec<_> = sort_storage_entries(&entries).into_iter().map(|e| e.key).collect();
        assert_eq!(keys, ["a", "b", "c"]);

        assert_eq!(
            storage_pin_key(StorageScope::Session, "https://example.com", "a"),
            "sessionStorage:https://example.com:a"
        );
    }

    #[test]
    fn filter_matches_key_or_value() {
        let entries = vec![entry("Token", "abc"), entry("theme", "DARK"), entry("other", "")];
        assert_eq!(filter_storage_entries(&entries, " tok ").len(), 1);
        assert_eq!(filter_storage_entries(&entries, "dark")[0].key, "theme");
        assert_eq!(filter_storage_entries(&entries, "   ").len(), 3);
    }

    #[test]
    fn groups_by_namespace() {
        let entries = vec![
            entry("auth.token", ""),
            entry("auth.refresh", ""),
            entry("cache:v1.data", ""),
            entry("plain", ""),
            entry(":leading", ""),
        ];
        let groups = group_storage_entries_by_namespace(&entries);
        assert_eq!(groups["auth"].len(), 2);
        assert_eq!(groups["cache"].len(), 1);
        assert_eq!(groups["root"].len(), 2);
    }
}
