//! Delete snapshots: the undo slot for bulk cookie deletion.
//!
//! A snapshot is captured right before a bulk delete runs and overwrites any previous one;
//! there is no history. Restoring does not consume it.
//!
//! Entries are kept as recorded, including ones that no longer parse as cookies: a persisted
//! snapshot may come from an older build or have been edited by hand. Malformed entries are
//! skipped (and counted) when restore operations are built, but any entry with a string `name`
//! and `domain` still takes part in [`apply_deletion`] and [`rollback`].

use std::collections::HashSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock;
use crate::cookies::{Cookie, CookieDescriptor};
use crate::storage::StorageArea;

pub const DELETE_SNAPSHOT_KIND: &str = "cookie-snatcher-delete-snapshot";
pub const DELETE_SNAPSHOT_VERSION: u32 = 1;

/// One recorded cookie, or whatever was stored in its place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotEntry {
    Cookie(Cookie),
    Malformed(Value),
}

impl SnapshotEntry {
    pub fn as_cookie(&self) -> Option<&Cookie> {
        match self {
            SnapshotEntry::Cookie(c) => Some(c),
            SnapshotEntry::Malformed(_) => None,
        }
    }

    /// The `domain:name` identity, available whenever `name` and `domain` are strings.
    pub fn storage_key(&self) -> Option<String> {
        match self {
            SnapshotEntry::Cookie(c) => Some(c.storage_key()),
            SnapshotEntry::Malformed(v) => {
                let (name, domain) = identity_fields(v)?;
                Some(format!("{domain}:{name}"))
            }
        }
    }

    /// The entry as a cookie for merging back into a list. A malformed entry that still has an
    /// identity comes back with an empty value when its own value is unusable.
    pub fn recover_cookie(&self) -> Option<Cookie> {
        match self {
            SnapshotEntry::Cookie(c) => Some(c.clone()),
            SnapshotEntry::Malformed(v) => {
                let (name, domain) = identity_fields(v)?;
                let mut record = v.as_object()?.clone();
                if !record.get("value").is_some_and(Value::is_string) {
                    record.insert("value".to_string(), Value::String(String::new()));
                }
                Cookie::deserialize_record(&Value::Object(record)).or_else(|| Some(Cookie::new(name, "", domain)))
            }
        }
    }
}

fn identity_fields(value: &Value) -> Option<(&str, &str)> {
    let name = value.get("name")?.as_str()?;
    let domain = value.get("domain")?.as_str()?;
    Some((name, domain))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSnapshot {
    pub kind: String,
    pub version: u32,
    pub reason: String,
    pub created_at: String,
    pub count: usize,
    pub cookies: Vec<SnapshotEntry>,
}

/// Copies `cookies` into a new snapshot. Does not touch the cookie jar.
pub fn create_snapshot(cookies: &[Cookie], reason: &str, created_at: Option<String>) -> DeleteSnapshot {
    DeleteSnapshot {
        kind: DELETE_SNAPSHOT_KIND.to_string(),
        version: DELETE_SNAPSHOT_VERSION,
        reason: reason.to_string(),
        created_at: created_at.unwrap_or_else(clock::now_iso),
        count: cookies.len(),
        cookies: cookies.iter().cloned().map(SnapshotEntry::Cookie).collect(),
    }
}

pub fn save_snapshot(area: &dyn StorageArea, key: &str, snapshot: &DeleteSnapshot) -> Result<()> {
    area.set_item(key, &serde_json::to_string(snapshot)?)
}

/// Reads the snapshot slot. Missing, unparsable and foreign data all read as `None`.
pub fn load_snapshot(area: &dyn StorageArea, key: &str) -> Option<DeleteSnapshot> {
    let raw = area.get_item(key)?;
    let value: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("ignoring unreadable delete snapshot: {e}");
            return None;
        }
    };

    if !is_delete_snapshot(&value) {
        log::warn!("ignoring delete snapshot with unexpected shape");
        return None;
    }
    serde_json::from_value(value).ok()
}

pub fn clear_snapshot(area: &dyn StorageArea, key: &str) -> Result<()> {
    area.remove_item(key)
}

/// Kind/version tag plus the presence and type of every required field.
pub fn is_delete_snapshot(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    obj.get("kind").and_then(Value::as_str) == Some(DELETE_SNAPSHOT_KIND)
        && obj.get("version").and_then(Value::as_u64) == Some(DELETE_SNAPSHOT_VERSION as u64)
        && obj.get("reason").is_some_and(Value::is_string)
        && obj.get("createdAt").is_some_and(Value::is_string)
        && obj.get("count").is_some_and(Value::is_number)
        && obj.get("cookies").is_some_and(Value::is_array)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestorePlan {
    pub operations: Vec<CookieDescriptor>,
    pub skipped_count: usize,
}

/// Turns a snapshot back into cookie-set operations. Expirations already past `now_ms`
/// are dropped (the cookie comes back as a session cookie); entries that are malformed or
/// whose URL cannot be derived are skipped and counted. Never fails.
pub fn build_restore_operations(snapshot: &DeleteSnapshot, now_ms: i64) -> RestorePlan {
    let mut operations = Vec::with_capacity(snapshot.cookies.len());
    let mut skipped_count = 0;

    for entry in &snapshot.cookies {
        let Some(cookie) = entry.as_cookie() else {
            skipped_count += 1;
            continue;
        };

        match CookieDescriptor::from_cookie(cookie.clone().without_past_expiration(now_ms)) {
            Ok(descriptor) => operations.push(descriptor),
            Err(e) => {
                log::debug!("skipping snapshot cookie {}: {e}", cookie.storage_key());
                skipped_count += 1;
            }
        }
    }

    RestorePlan { operations, skipped_count }
}

/// `current` minus every cookie whose `domain:name` is in the snapshot.
pub fn apply_deletion(current: &[Cookie], snapshot: &DeleteSnapshot) -> Vec<Cookie> {
    let deleted: HashSet<String> = snapshot.cookies.iter().filter_map(SnapshotEntry::storage_key).collect();
    current.iter().filter(|c| !deleted.contains(&c.storage_key())).cloned().collect()
}

/// `current` plus every snapshot cookie whose `domain:name` is not already present. On a
/// collision the current cookie wins.
pub fn rollback(current: &[Cookie], snapshot: &DeleteSnapshot) -> Vec<Cookie> {
    let mut merged = current.to_vec();
    let mut present: HashSet<String> = current.iter().map(Cookie::storage_key).collect();

    for cookie in snapshot.cookies.iter().filter_map(SnapshotEntry::recover_cookie) {
        if present.insert(cookie.storage_key()) {
            merged.push(cookie);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::storage::InMemoryStorageArea;

    const KEY: &str = "cookieSnatcher.lastDeleteSnapshot";

    fn cookie(name: &str, domain: &str) -> Cookie {
        Cookie::new(name, format!("{name}-value"), domain)
    }

    fn keys(cookies: &[Cookie]) -> Vec<String> {
        let mut keys: Vec<_> = cookies.iter().map(Cookie::storage_key).collect();
        keys.sort();
        keys
    }

    #[test]
    fn create_copies_and_tags() {
        let snapshot = create_snapshot(&[cookie("a", "x.com")], "Delete filtered", Some("2024-01-01T00:00:00.000Z".into()));
        let v = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(v["kind"], DELETE_SNAPSHOT_KIND);
        assert_eq!(v["version"], 1);
        assert_eq!(v["count"], 1);
        assert_eq!(v["createdAt"], "2024-01-01T00:00:00.000Z");
        assert_eq!(v["cookies"][0]["name"], "a");
        assert!(is_delete_snapshot(&v));
    }

    #[test]
    fn save_load_clear() {
        let area = InMemoryStorageArea::new();
        assert!(load_snapshot(&area, KEY).is_none());

        let snapshot = create_snapshot(&[cookie("a", "x.com")], "test", None);
        save_snapshot(&area, KEY, &snapshot).unwrap();
        assert_eq!(load_snapshot(&area, KEY), Some(snapshot));

        clear_snapshot(&area, KEY).unwrap();
        assert!(load_snapshot(&area, KEY).is_none());
    }

    #[test]
    fn load_ignores_garbage() {
        let area = InMemoryStorageArea::with_items([
            ("bad-json", "{not json"),
            ("wrong-kind", r#"{"kind":"other","version":1,"reason":"","createdAt":"","count":0,"cookies":[]}"#),
            ("wrong-version", r#"{"kind":"cookie-snatcher-delete-snapshot","version":2,"reason":"","createdAt":"","count":0,"cookies":[]}"#),
            ("missing-count", r#"{"kind":"cookie-snatcher-delete-snapshot","version":1,"reason":"","createdAt":"","cookies":[]}"#),
        ]);
        for key in ["bad-json", "wrong-kind", "wrong-version", "missing-count"] {
            assert!(load_snapshot(&area, key).is_none(), "{key}");
        }
    }

    #[test]
    fn restore_defaults_and_skips() {
        let mut snapshot = create_snapshot(
            &[
                cookie("keep", ".x.com").with_expiration(9_999_999_999.0),
                cookie("expired", "x.com").with_expiration(1.0),
                cookie("bad-domain", "http://x.com"),
            ],
            "test",
            None,
        );
        snapshot.cookies.push(SnapshotEntry::Malformed(json!({ "name": 5 })));
        snapshot.cookies.push(SnapshotEntry::Malformed(json!("garbage")));

        let plan = build_restore_operations(&snapshot, 1_000_000);
        assert_eq!(plan.operations.len(), 2);
        assert_eq!(plan.skipped_count, 3);

        let keep = &plan.operations[0];
        assert_eq!(keep.url, "http://x.com/");
        assert_eq!(keep.cookie.path, "/");
        assert_eq!(keep.cookie.expiration_date, Some(9_999_999_999.0));
        assert!(plan.operations[1].cookie.is_session());
    }

    #[test]
    fn persisted_malformed_entries_survive_loading() {
        let raw = json!({
            "kind": DELETE_SNAPSHOT_KIND, "version": 1, "reason": "r", "createdAt": "t", "count": 2,
            "cookies": [
                { "name": "a", "value": "1", "domain": "x.com", "secure": 1, "sameSite": null },
                { "name": "b", "domain": "x.com" },
            ]
        });
        let area = InMemoryStorageArea::with_items([(KEY, raw.to_string().as_str())]);
        let snapshot = load_snapshot(&area, KEY).unwrap();

        let plan = build_restore_operations(&snapshot, 0);
        assert_eq!(plan.skipped_count, 1);
        assert_eq!(plan.operations[0].url, "https://x.com/");
    }

    #[test]
    fn delete_then_rollback_restores_identity_set() {
        let current = vec![cookie("a", "x.com"), cookie("b", "x.com"), cookie("c", "y.com")];
        let snapshot = create_snapshot(&current[..2], "test", None);

        let after_delete = apply_deletion(&current, &snapshot);
        assert_eq!(keys(&after_delete), vec!["y.com:c"]);

        let restored = rollback(&after_delete, &snapshot);
        assert_eq!(keys(&restored), keys(&current));
    }

    #[test]
    fn rollback_keeps_cookies_recreated_after_snapshot() {
        let original = cookie("a", "x.com");
        let snapshot = create_snapshot(std::slice::from_ref(&original), "test", None);

        // recreated by the site between delete and undo
        let mut recreated = original.clone();
        recreated.value = "fresh".into();

        let merged = rollback(&[recreated], &snapshot);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, "fresh");

        // a second undo does not duplicate
        assert_eq!(rollback(&merged, &snapshot).len(), 1);
    }

    #[test]
    fn valueless_entries_still_carry_identity() {
        let mut snapshot = create_snapshot(&[], "test", None);
        snapshot.cookies.push(SnapshotEntry::Malformed(json!({ "name": "b", "domain": "x.com" })));
        snapshot.cookies.push(SnapshotEntry::Malformed(json!({ "name": 5, "domain": "x.com" })));

        let current = vec![Cookie::new("b", "1", "x.com"), cookie("c", "x.com")];
        let after_delete = apply_deletion(&current, &snapshot);
        assert_eq!(keys(&after_delete), vec!["x.com:c"]);

        let restored = rollback(&after_delete, &snapshot);
        assert_eq!(keys(&restored), vec!["x.com:b", "x.com:c"]);
        let b = restored.iter().find(|c| c.name == "b").unwrap();
        assert_eq!(b.value, "");
        assert_eq!(b.path, "/");
    }
}
