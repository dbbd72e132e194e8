//! Storage bridge: lets the panel read and write the storage areas of a page it does not run in.
//!
//! - [`contract`]: the request/response envelopes and their validation.
//! - [`StorageResponder`]: runs in the page, executes envelopes against the page's areas.
//! - [`BridgeClient`]: runs in the panel, sends envelopes and installs the responder lazily.
//! - [`BridgeTransport`]: the host messaging capability both sides meet through.

use thiserror::Error;

mod client;
pub mod contract;
mod responder;
mod transport;

pub use client::BridgeClient;
pub use contract::{StorageAction, StorageRequest, StorageResponse, STORAGE_CHANNEL};
pub use responder::{MessageListener, StorageResponder};
pub use transport::{
    resolve_responder_script_path, BridgeTransport, ContentScript, Manifest, TransportError, TransportErrorKind,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The host could not deliver the envelope.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Invalid storage bridge response.")]
    InvalidResponse,

    /// The responder answered with a failure envelope.
    #[error("{0}")]
    Remote(String),
}

impl BridgeError {
    /// True when the page may simply not be ready yet.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Transport(e) if e.is_transient())
    }
}
