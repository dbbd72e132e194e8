//! Export/import of a single storage area.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock;
use crate::storage::mutation::stringify_value;
use crate::storage::{StorageEntry, StorageError, StorageScope};

pub const STORAGE_EXPORT_KIND: &str = "cookie-snatcher-storage-export";
pub const STORAGE_EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageExportPayload {
    pub kind: String,
    pub version: u32,
    pub storage_area: StorageScope,
    pub origin: String,
    pub exported_at: String,
    pub entries: Vec<StorageEntry>,
}

pub fn create_export_payload(
    entries: &[StorageEntry],
    area: StorageScope,
    origin: &str,
) -> StorageExportPayload {
    StorageExportPayload {
        kind: STORAGE_EXPORT_KIND.to_string(),
        version: STORAGE_EXPORT_VERSION,
        storage_area: area,
        origin: origin.to_string(),
        exported_at: clock::now_iso(),
        entries: normalize_entries(entries.iter().cloned()),
    }
}

/// Accepts a bare array of entries or an export object with an `entries` array.
pub fn parse_import_payload(input: &Value) -> Result<Vec<StorageEntry>, StorageError> {
    let raw = match input {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("entries") {
            Some(Value::Array(items)) => items,
            _ => return Err(StorageError::MissingEntries),
        },
        _ => return Err(StorageError::InvalidImportPayload),
    };

    let entries = entries_from_values(raw);
    if entries.is_empty() {
        return Err(StorageError::NoValidEntries);
    }
    Ok(entries)
}

/// Reads the area hint carried by an export payload, if any.
pub fn import_area_hint(input: &Value) -> Option<StorageScope> {
    input
        .get("storageArea")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

/// Keeps entries with a non-blank key and deduplicates by key: last write wins,
/// first-seen position is kept.
pub(crate) fn normalize_entries(entries: impl IntoIterator<Item = StorageEntry>) -> Vec<StorageEntry> {
    let mut out: Vec<StorageEntry> = Vec::new();
    let mut index = std::collections::HashMap::new();

    for entry in entries {
        if entry.key.trim().is_empty() {
            continue;
        }
        match index.get(&entry.key) {
            Some(&pos) => out[pos] = entry,
            None => {
                index.insert(entry.key.clone(), out.len());
                out.push(entry);
            }
        }
    }
    out
}

/// Like [`normalize_entries`] for untrusted JSON: non-objects and non-string keys are
/// skipped, values are stringified.
pub(crate) fn entries_from_values(raw: &[Value]) -> Vec<StorageEntry> {
    let parsed = raw.iter().filter_map(|item| {
        let obj = item.as_object()?;
        let key = obj.get("key")?.as_str()?;
        let value = obj.get("value").map(stringify_value).unwrap_or_default();
        Some(StorageEntry::new(key, value))
    });
    normalize_entries(parsed)
}
