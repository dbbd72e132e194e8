//! Key/value storage areas.
//!
//! Every piece of key/value state in the crate goes through the [`StorageArea`] trait:
//!
//! - the **localStorage** and **sessionStorage** areas living inside a page context, which the
//!   bridge responder reads and writes on behalf of the panel;
//! - the panel's own persistence slot (last delete snapshot, profile list, pinned cookies).
//!
//! # Backends
//!
//! - [`InMemoryStorageArea`]: no persistence, used for page storage and tests.
//! - [`JsonFileStorageArea`]: a single pretty-printed JSON file.
//! - [`SqliteStorageArea`]: a namespaced table in a SQLite database (feature `sqlite_store`).
//!
//! The remaining submodules are pure helpers over [`StorageEntry`] lists: import/export
//! ([`transfer`]), edit planning ([`mutation`]) and list views ([`view`]).
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use crumble::storage::{InMemoryStorageArea, StorageArea, StorageHandles, StorageScope};
//!
//! let handles = StorageHandles::new(
//!     Arc::new(InMemoryStorageArea::with_items([("token", "abc")])),
//!     Arc::new(InMemoryStorageArea::new()),
//! );
//! assert_eq!(handles.area(StorageScope::Local).get_item("token").as_deref(), Some("abc"));
//! ```

use std::sync::Arc;

use thiserror::Error;

mod area;
mod in_memory;
mod json_file;
#[cfg(feature = "sqlite_store")]
mod sqlite_store;

pub mod mutation;
pub mod transfer;
pub mod view;

pub use area::{StorageArea, StorageEntry, StorageScope};
pub use in_memory::InMemoryStorageArea;
pub use json_file::JsonFileStorageArea;
#[cfg(feature = "sqlite_store")]
pub use sqlite_store::SqliteStorageArea;

/// Validation errors raised while preparing storage writes and imports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Storage key is required.")]
    KeyRequired,

    #[error("Import payload must be an array or an export object.")]
    InvalidImportPayload,

    #[error("Import payload must contain an entries array.")]
    MissingEntries,

    #[error("No valid storage entries found in import payload.")]
    NoValidEntries,
}

/// The local and session areas of one page context.
#[derive(Clone)]
pub struct StorageHandles {
    pub local: Arc<dyn StorageArea>,
    pub session: Arc<dyn StorageArea>,
}

impl StorageHandles {
    pub fn new(local: Arc<dyn StorageArea>, session: Arc<dyn StorageArea>) -> Self {
        Self { local, session }
    }

    /// Two fresh in-memory areas.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStorageArea::new()), Arc::new(InMemoryStorageArea::new()))
    }

    pub fn area(&self, scope: StorageScope) -> &Arc<dyn StorageArea> {
        match scope {
            StorageScope::Local => &self.local,
            StorageScope::Session => &self.session,
        }
    }
}

impl std::fmt::Debug for StorageHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageHandles")
            .field("local_len", &self.local.len())
            .field("session_len", &self.session.len())
            .finish()
    }
}
