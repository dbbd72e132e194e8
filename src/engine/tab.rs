// src/engine/tab.rs
//! Tab targeting: [`TabId`], [`TabInfo`] and the [`TabQuery`] host capability.
//!
use std::fmt::Display;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for a tab, represented as a UUID.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(Uuid);

impl TabId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TabId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the host knows about a tab. `url` is `None` for tabs without a committed URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: Option<String>,
}

/// Host capability that resolves "the current tab".
#[async_trait]
pub trait TabQuery: Send + Sync {
    /// Returns the active tab, if any.
    async fn active_tab(&self) -> anyhow::Result<Option<TabInfo>>;
}
