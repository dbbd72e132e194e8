//! Three-way comparison of a stored profile against live state.
//!
//! Cookies are matched by [`Cookie::profile_identity`] and compared on
//! [`Cookie::comparable`]; storage entries are matched by raw key and compared on value.
//! "Added" means present live but not stored.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cookies::Cookie;
use crate::profile::ProfileState;
use crate::storage::StorageEntry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedEntry {
    pub key: String,
    pub stored_value: String,
    pub live_value: String,
}

/// Keys in each list are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SetDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<ChangedEntry>,
}

impl SetDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub added: usize,
    pub removed: usize,
    pub changed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDiff {
    pub cookies: SetDiff,
    pub local_storage: SetDiff,
    pub session_storage: SetDiff,
    pub summary: DiffSummary,
}

impl ProfileDiff {
    pub fn is_empty(&self) -> bool {
        self.summary == DiffSummary::default()
    }
}

pub fn diff(stored: &ProfileState, live: &ProfileState) -> ProfileDiff {
    let cookies = diff_cookies(&stored.cookies, &live.cookies);
    let local_storage = diff_entries(&stored.local_storage_entries, &live.local_storage_entries);
    let session_storage = diff_entries(&stored.session_storage_entries, &live.session_storage_entries);

    let parts = [&cookies, &local_storage, &session_storage];
    let summary = DiffSummary {
        added: parts.iter().map(|d| d.added.len()).sum(),
        removed: parts.iter().map(|d| d.removed.len()).sum(),
        changed: parts.iter().map(|d| d.changed.len()).sum(),
    };

    ProfileDiff { cookies, local_storage, session_storage, summary }
}

fn diff_cookies(stored: &[Cookie], live: &[Cookie]) -> SetDiff {
    let stored: BTreeMap<String, &Cookie> = stored.iter().map(|c| (c.profile_identity(), c)).collect();
    let live: BTreeMap<String, &Cookie> = live.iter().map(|c| (c.profile_identity(), c)).collect();

    diff_maps(&stored, &live, |s, l| s.comparable() != l.comparable(), |c| c.value.clone())
}

fn diff_entries(stored: &[StorageEntry], live: &[StorageEntry]) -> SetDiff {
    let stored: BTreeMap<String, &str> = stored.iter().map(|e| (e.key.clone(), e.value.as_str())).collect();
    let live: BTreeMap<String, &str> = live.iter().map(|e| (e.key.clone(), e.value.as_str())).collect();

    diff_maps(&stored, &live, |s, l| s != l, |v| v.to_string())
}

/// BTreeMap iteration keeps every output list sorted by key.
fn diff_maps<T>(
    stored: &BTreeMap<String, T>,
    live: &BTreeMap<String, T>,
    differs: impl Fn(&T, &T) -> bool,
    shown: impl Fn(&T) -> String,
) -> SetDiff {
    let mut out = SetDiff::default();

    for (key, live_item) in live {
        match stored.get(key) {
            None => out.added.push(key.clone()),
            Some(stored_item) if differs(stored_item, live_item) => out.changed.push(ChangedEntry {
                key: key.clone(),
                stored_value: shown(stored_item),
                live_value: shown(live_item),
            }),
            Some(_) => {}
        }
    }
    out.removed = stored.keys().filter(|k| !live.contains_key(*k)).cloned().collect();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(cookies: Vec<Cookie>, local: &[(&str, &str)]) -> ProfileState {
        ProfileState {
            cookies,
            local_storage_entries: local.iter().map(|(k, v)| StorageEntry::new(*k, *v)).collect(),
            session_storage_entries: Vec::new(),
        }
    }

    #[test]
    fn classifies_added_removed_changed() {
        let stored = state(
            vec![Cookie::new("a", "1", "x.com"), Cookie::new("b", "1", "x.com")],
            &[("keep", "1"), ("gone", "1"), ("edit", "old")],
        );
        let live = state(
            vec![Cookie::new("b", "2", "x.com"), Cookie::new("c", "1", "x.com")],
            &[("keep", "1"), ("edit", "new"), ("fresh", "1")],
        );

        let d = diff(&stored, &live);
        assert_eq!(d.cookies.added, vec!["x.com:c:/:0"]);
        assert_eq!(d.cookies.removed, vec!["x.com:a:/:0"]);
        assert_eq!(
            d.cookies.changed,
            vec![ChangedEntry { key: "x.com:b:/:0".into(), stored_value: "1".into(), live_value: "2".into() }]
        );
        assert_eq!(d.local_storage.added, vec!["fresh"]);
        assert_eq!(d.local_storage.removed, vec!["gone"]);
        assert_eq!(d.local_storage.changed[0].key, "edit");
        assert_eq!(d.summary, DiffSummary { added: 2, removed: 2, changed: 2 });
    }

    #[test]
    fn path_and_store_distinguish_cookies() {
        let stored = state(vec![Cookie::new("a", "1", "x.com")], &[]);
        let live = state(
            vec![Cookie::new("a", "1", "x.com").with_path("/app"), Cookie::new("a", "1", "x.com").with_store_id("1")],
            &[],
        );

        let d = diff(&stored, &live);
        assert_eq!(d.cookies.added, vec!["x.com:a:/:1", "x.com:a:/app:0"]);
        assert_eq!(d.cookies.removed, vec!["x.com:a:/:0"]);
    }

    #[test]
    fn flag_changes_count_as_changed() {
        let stored = state(vec![Cookie::new("a", "1", "x.com")], &[]);
        let live = state(vec![Cookie::new("a", "1", "x.com").with_secure(true)], &[]);

        let d = diff(&stored, &live);
        assert_eq!(d.cookies.changed.len(), 1);
        assert_eq!(d.cookies.changed[0].stored_value, d.cookies.changed[0].live_value);
    }

    #[test]
    fn swapping_sides_swaps_added_and_removed() {
        let x = state(vec![Cookie::new("a", "1", "x.com")], &[("k1", "v")]);
        let y = state(vec![Cookie::new("b", "1", "y.com")], &[("k2", "v")]);

        let forward = diff(&x, &y);
        let backward = diff(&y, &x);
        assert_eq!(forward.cookies.added, backward.cookies.removed);
        assert_eq!(forward.cookies.removed, backward.cookies.added);
        assert_eq!(forward.local_storage.added, backward.local_storage.removed);
        assert_eq!(forward.summary.added, backward.summary.removed);
    }

    #[test]
    fn diff_with_itself_is_empty() {
        let x = state(
            vec![Cookie::new("a", "1", "x.com").with_expiration(5.0), Cookie::new("b", "", "y.com")],
            &[("k", "v")],
        );
        let d = diff(&x, &x);
        assert!(d.is_empty());
        assert!(d.cookies.is_empty() && d.local_storage.is_empty() && d.session_storage.is_empty());
    }
}
