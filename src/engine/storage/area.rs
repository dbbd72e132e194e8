use std::fmt::Display;
use std::str::FromStr;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Object-safe key/value storage area (DOM's Storage).
///
/// The same trait backs both the storage areas living inside a page context
/// and the panel's own persistence (snapshot slot, profile list, pinned set).
pub trait StorageArea: Send + Sync {
    /// Retrieves the value associated with the given key, or `None` if not found.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Sets the value for the given key, overwriting any existing value.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Removes the item with the given key.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Clears all items in the storage area.
    fn clear(&self) -> Result<()>;

    /// Returns the number of items in the storage area.
    fn len(&self) -> usize;

    /// Returns a vector of all keys in the storage area.
    fn keys(&self) -> Vec<String>;

    /// Returns true when the area holds no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enumerates every key/value pair, in `keys()` order.
    fn entries(&self) -> Vec<StorageEntry> {
        self.keys()
            .into_iter()
            .filter_map(|key| {
                let value = self.get_item(&key)?;
                Some(StorageEntry { key, value })
            })
            .collect()
    }
}

/// Which of the two page storage namespaces an operation targets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageScope {
    #[serde(rename = "localStorage")]
    Local,
    #[serde(rename = "sessionStorage")]
    Session,
}

impl StorageScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageScope::Local => "localStorage",
            StorageScope::Session => "sessionStorage",
        }
    }
}

impl Display for StorageScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageScope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "localStorage" => Ok(StorageScope::Local),
            "sessionStorage" => Ok(StorageScope::Session),
            _ => Err(()),
        }
    }
}

/// A single key/value pair as exchanged on the wire and stored in profiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageEntry {
    pub key: String,
    pub value: String,
}

impl StorageEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}
