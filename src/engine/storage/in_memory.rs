use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};

use crate::engine::storage::area::StorageArea;

/// In-memory storage area (no persistence). Used for page storage in the local host and
/// as the default persistence backend in tests.
#[derive(Default)]
pub struct InMemoryStorageArea {
    map: RwLock<HashMap<String, String>>,
}

impl InMemoryStorageArea {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an area pre-populated with `items`.
    pub fn with_items<'a>(items: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let map = items
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { map: RwLock::new(map) }
    }
}

impl StorageArea for InMemoryStorageArea {
    fn get_item(&self, key: &str) -> Option<String> {
        self.map.read().ok()?.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.map
            .write()
            .map_err(|_| anyhow!("storage area lock poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.map
            .write()
            .map_err(|_| anyhow!("storage area lock poisoned"))?
            .remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.map
            .write()
            .map_err(|_| anyhow!("storage area lock poisoned"))?
            .clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.map.read().map(|m| m.len()).unwrap_or(0)
    }

    fn keys(&self) -> Vec<String> {
        let mut v: Vec<String> = self
            .map
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        v.sort_unstable(); // deterministic enumeration order
        v
    }
}
