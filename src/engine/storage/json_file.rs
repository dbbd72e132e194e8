//! JSON-backed storage area.
//!
//! `JsonFileStorageArea` persists a flat string map in a single JSON file on disk.
//! It is the simplest durable backend for the panel's persistence slot (delete
//! snapshot, profile list, pinned cookies).
//!
//! ### Design
//! - One file, one object: `{ "items": { "<key>": "<value>", ... } }`.
//! - An in-memory copy is kept behind a `RwLock` and the whole file is rewritten
//!   after every mutation.
//!
//! ### I/O characteristics & caveats
//! - Every mutation rewrites the entire file; this is meant for a handful of keys.
//! - A file that cannot be parsed is treated as empty and replaced on the next write.
//! - File writes are not atomic.
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::storage::area::StorageArea;

/// On-disk representation of the storage file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StorageFile {
    items: BTreeMap<String, String>,
}

pub struct JsonFileStorageArea {
    /// Path to the JSON file where items are stored.
    path: PathBuf,
    /// Cached file contents.
    items: RwLock<BTreeMap<String, String>>,
}

impl JsonFileStorageArea {
    /// Opens (or creates) a JSON storage file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read storage file {}", path.display()))?;
            match serde_json::from_str::<StorageFile>(&contents) {
                Ok(file) => file.items,
                Err(e) => {
                    log::warn!("storage file {} is corrupt, starting empty: {e}", path.display());
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        let store = Self { path, items: RwLock::new(items) };
        {
            let items = store.items.read().map_err(|_| anyhow!("storage lock poisoned"))?;
            store.save(&items)?;
        }
        Ok(store)
    }

    /// Serializes and writes the full storage file (pretty-printed).
    fn save(&self, items: &BTreeMap<String, String>) -> Result<()> {
        let file = StorageFile { items: items.clone() };
        let contents = serde_json::to_string_pretty(&file)?;
        fs::write(&self.path, contents)
            .with_context(|| format!("failed to write storage file {}", self.path.display()))
    }

    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let mut items = self.items.write().map_err(|_| anyhow!("storage lock poisoned"))?;
        f(&mut items);
        self.save(&items)
    }
}

impl StorageArea for JsonFileStorageArea {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().ok()?.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.mutate(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.mutate(|items| {
            items.remove(key);
        })
    }

    fn clear(&self) -> Result<()> {
        self.mutate(|items| items.clear())
    }

    fn len(&self) -> usize {
        self.items.read().map(|m| m.len()).unwrap_or(0)
    }

    fn keys(&self) -> Vec<String> {
        self.items
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }
}
