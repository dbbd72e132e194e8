//! Pin sets persisted as `{ "<identity>": true }`. Cookies are pinned by `domain:name`;
//! the panel keeps a second set for storage entries keyed by area, origin and key.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use serde_json::Value;

use crate::cookies::lenient::is_truthy;
use crate::cookies::Cookie;
use crate::storage::StorageArea;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinnedCookies {
    keys: BTreeSet<String>,
}

impl PinnedCookies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the pinned set from `area[key]`. Missing or corrupt data yields an empty set.
    pub fn load(area: &dyn StorageArea, key: &str) -> Self {
        let Some(raw) = area.get_item(key) else {
            return Self::default();
        };

        match serde_json::from_str::<BTreeMap<String, Value>>(&raw) {
            Ok(map) => Self {
                keys: map.into_iter().filter(|(_, v)| is_truthy(v)).map(|(k, _)| k).collect(),
            },
            Err(e) => {
                log::error!("error loading pinned cookies: {e}");
                Self::default()
            }
        }
    }

    pub fn save(&self, area: &dyn StorageArea, key: &str) -> Result<()> {
        let map: BTreeMap<&str, bool> = self.keys.iter().map(|k| (k.as_str(), true)).collect();
        area.set_item(key, &serde_json::to_string(&map)?)
    }

    pub fn is_pinned(&self, cookie: &Cookie) -> bool {
        self.keys.contains(&cookie.storage_key())
    }

    pub fn contains_key(&self, storage_key: &str) -> bool {
        self.keys.contains(storage_key)
    }

    pub fn pin(&mut self, cookie: &Cookie) {
        self.keys.insert(cookie.storage_key());
    }

    /// Returns true if the cookie was pinned.
    pub fn unpin(&mut self, cookie: &Cookie) -> bool {
        self.keys.remove(&cookie.storage_key())
    }

    /// Flips the pin on a raw identity and returns the new state.
    pub fn toggle_key(&mut self, key: &str) -> bool {
        if self.keys.remove(key) {
            false
        } else {
            self.keys.insert(key.to_string());
            true
        }
    }

    /// Flips the pin and returns the new state.
    pub fn toggle(&mut self, cookie: &Cookie) -> bool {
        if self.unpin(cookie) {
            false
        } else {
            self.pin(cookie);
            true
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
