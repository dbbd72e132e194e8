//! The host messaging capability the bridge client talks through.

use std::fmt::Display;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::tab::TabId;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// The target context does not exist (closed tab, bad id).
    Unreachable,
    /// The target exists but nothing on its bus answered.
    NoListener,
    Other,
}

impl Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportErrorKind::Unreachable => write!(f, "unreachable"),
            TransportErrorKind::NoListener => write!(f, "no listener"),
            TransportErrorKind::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Unreachable, message)
    }

    pub fn no_listener(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::NoListener, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }

    /// The target is not (yet) able to answer; worth retrying after a short delay.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, TransportErrorKind::Unreachable | TransportErrorKind::NoListener)
    }
}

/// The subset of the extension manifest the injector reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub content_scripts: Vec<ContentScript>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentScript {
    #[serde(default)]
    pub js: Vec<String>,
}

#[async_trait]
pub trait BridgeTransport: Send + Sync {
    /// Delivers `message` to the target context and waits for exactly one reply.
    async fn send_message(&self, target: TabId, message: Value) -> Result<Value, TransportError>;

    /// Loads the script at `path` into the target context.
    async fn inject_script(&self, target: TabId, path: &str) -> Result<(), TransportError>;

    /// The host's own manifest, if it can be read.
    fn manifest(&self) -> Option<Manifest>;
}

/// Picks the first declared content script whose path contains `marker`, so a build step
/// that fingerprints the file name does not break injection. Falls back to `default`.
pub fn resolve_responder_script_path(manifest: Option<&Manifest>, marker: &str, default: &str) -> String {
    manifest
        .into_iter()
        .flat_map(|m| m.content_scripts.iter())
        .flat_map(|cs| cs.js.iter())
        .find(|path| path.contains(marker))
        .cloned()
        .unwrap_or_else(|| default.to_string())
}
