//! Crumble engine: the state-synchronization core of a cookie and storage inspector panel.
//!
//! The panel lives in a privileged context and never touches page storage directly. It talks
//! to a page through the storage [`bridge`]: a fixed-channel request/response envelope that a
//! responder inside the page answers. Destructive bulk deletes are guarded by a typed
//! confirmation ([`bulk_delete`]) and can be undone from the last delete [`snapshot`]. Named
//! [`profile`]s capture cookies plus both storage areas, can be diffed against live state and
//! travel as versioned export payloads.
//!
//! Host capabilities are traits: [`cookies::CookieJar`], [`bridge::BridgeTransport`],
//! [`tab::TabQuery`] and [`storage::StorageArea`]. [`host::LocalHost`] is an in-process
//! browser model implementing the transport and tab query.

pub mod bridge;
pub mod bulk_delete;
pub mod clock;
pub mod config;
pub mod cookies;
pub mod domain;
pub mod errors;
pub mod host;
pub mod panel;
pub mod profile;
pub mod snapshot;
pub mod storage;
pub mod tab;

pub use config::EngineConfig;
pub use errors::EngineError;
pub use panel::Panel;
