//! In-process host: a small browser model implementing [`BridgeTransport`] and [`TabQuery`].
//!
//! Each tab runs a page worker on its own tokio task and is driven over an mpsc channel with
//! oneshot replies. A page starts without the storage responder; the bridge client has to
//! inject it, and every navigation starts a fresh page load that has to be instrumented
//! again. Local storage is kept per origin across navigations, session storage is not.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use crumble::host::LocalHost;
//! use crumble::storage::StorageScope;
//!
//! let host = LocalHost::new();
//! let tab = host.open_tab("https://example.com/");
//! host.page_storage(tab).await?.area(StorageScope::Local).set_item("token", "abc")?;
//! # Ok(())
//! # }
//! ```

mod page;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::bridge::{BridgeTransport, Manifest, TransportError};
use crate::config::DEFAULT_RESPONDER_SCRIPT;
use crate::storage::StorageHandles;
use crate::tab::{TabId, TabInfo, TabQuery};

use page::{OriginStorage, PageHandle, PageWorker};
pub use page::PageInfo;

const PAGE_CHANNEL_CAPACITY: usize = 32;

pub struct LocalHost {
    pages: RwLock<HashMap<TabId, PageHandle>>,
    active: RwLock<Option<TabId>>,
    origins: OriginStorage,
    manifest: Option<Manifest>,
    responder_script: String,
}

impl Default for LocalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalHost {
    /// A host without a readable manifest whose responder lives at the default script path.
    pub fn new() -> Self {
        Self {
            pages: RwLock::new(HashMap::new()),
            active: RwLock::new(None),
            origins: Arc::new(Mutex::new(HashMap::new())),
            manifest: None,
            responder_script: DEFAULT_RESPONDER_SCRIPT.to_string(),
        }
    }

    /// Declares `manifest` and the (possibly fingerprinted) path the responder is served from.
    pub fn with_manifest(mut self, manifest: Manifest, responder_script: impl Into<String>) -> Self {
        self.manifest = Some(manifest);
        self.responder_script = responder_script.into();
        self
    }

    /// Opens a tab on `url`, makes it active and returns its id. The page worker is spawned
    /// onto the current tokio runtime.
    pub fn open_tab(&self, url: impl Into<String>) -> TabId {
        self.spawn_page(Some(url.into()))
    }

    /// Opens a tab that has no URL yet.
    pub fn open_blank_tab(&self) -> TabId {
        self.spawn_page(None)
    }

    fn spawn_page(&self, url: Option<String>) -> TabId {
        let tab = TabId::new();
        let (cmd_tx, cmd_rx) = mpsc::channel(PAGE_CHANNEL_CAPACITY);
        let worker = PageWorker::new(tab, url, cmd_rx, self.responder_script.clone(), self.origins.clone());
        tokio::spawn(worker.run());

        if let Ok(mut pages) = self.pages.write() {
            pages.insert(tab, PageHandle::new(tab, cmd_tx));
        }
        if let Ok(mut active) = self.active.write() {
            *active = Some(tab);
        }
        log::debug!("opened tab {tab}");
        tab
    }

    /// Drops the tab; its worker stops once the last in-flight command is answered.
    pub fn close_tab(&self, tab: TabId) {
        if let Ok(mut pages) = self.pages.write() {
            pages.remove(&tab);
        }
        if let Ok(mut active) = self.active.write() {
            if *active == Some(tab) {
                *active = None;
            }
        }
    }

    pub fn activate(&self, tab: TabId) -> Result<(), TransportError> {
        self.page(tab)?;
        if let Ok(mut active) = self.active.write() {
            *active = Some(tab);
        }
        Ok(())
    }

    /// Starts a new page load in `tab`. Listeners are dropped and session storage is reset.
    pub async fn navigate(&self, tab: TabId, url: impl Into<String>) -> Result<(), TransportError> {
        self.page(tab)?.navigate(Some(url.into())).await
    }

    pub async fn page_info(&self, tab: TabId) -> Result<PageInfo, TransportError> {
        self.page(tab)?.describe().await
    }

    /// The storage areas of the page currently loaded in `tab`.
    pub async fn page_storage(&self, tab: TabId) -> Result<StorageHandles, TransportError> {
        Ok(self.page_info(tab).await?.storage)
    }

    fn page(&self, tab: TabId) -> Result<PageHandle, TransportError> {
        self.pages
            .read()
            .map_err(|_| TransportError::other("tab registry lock poisoned"))?
            .get(&tab)
            .cloned()
            .ok_or_else(|| TransportError::unreachable(format!("No tab with id: {tab}.")))
    }
}

#[async_trait]
impl BridgeTransport for LocalHost {
    async fn send_message(&self, target: TabId, message: Value) -> Result<Value, TransportError> {
        self.page(target)?.deliver(message).await
    }

    async fn inject_script(&self, target: TabId, path: &str) -> Result<(), TransportError> {
        self.page(target)?.inject_script(path).await
    }

    fn manifest(&self) -> Option<Manifest> {
        self.manifest.clone()
    }
}

#[async_trait]
impl TabQuery for LocalHost {
    async fn active_tab(&self) -> anyhow::Result<Option<TabInfo>> {
        let active = *self.active.read().map_err(|_| anyhow::anyhow!("active tab lock poisoned"))?;
        let Some(id) = active else {
            return Ok(None);
        };
        let info = self.page_info(id).await?;
        Ok(Some(TabInfo { id, url: info.url }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::bridge::{BridgeClient, ContentScript, StorageRequest, TransportErrorKind};
    use crate::config::EngineConfig;
    use crate::storage::StorageScope;

    fn client(host: &Arc<LocalHost>) -> BridgeClient {
        BridgeClient::new(host.clone(), &EngineConfig::default())
    }

    #[tokio::test]
    async fn fresh_page_has_no_listener() {
        let host = LocalHost::new();
        let tab = host.open_tab("https://example.com/");

        let err = host.send_message(tab, StorageRequest::ping().to_value()).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::NoListener);
        assert_eq!(err.message, "Could not establish connection. Receiving end does not exist.");
    }

    #[tokio::test]
    async fn unknown_tab_is_unreachable() {
        let host = LocalHost::new();
        let err = host.send_message(TabId::new(), json!({})).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Unreachable);
        assert!(err.message.starts_with("No tab with id:"));
    }

    #[tokio::test]
    async fn client_installs_responder_and_reads_storage() {
        let host = Arc::new(LocalHost::new());
        let tab = host.open_tab("https://example.com/app");
        host.page_storage(tab).await.unwrap().local.set_item("token", "abc").unwrap();

        let c = client(&host);
        let pong = c.ensure_ready(tab).await.unwrap();
        assert_eq!(pong, json!({ "ready": true, "origin": "https://example.com" }));
        assert!(host.page_info(tab).await.unwrap().responder_installed);

        let data = c.get_all(tab, StorageScope::Local).await.unwrap();
        assert_eq!(data["items"], json!([{ "key": "token", "value": "abc" }]));
    }

    #[tokio::test]
    async fn reinjection_is_harmless() {
        let host = LocalHost::new();
        let tab = host.open_tab("https://example.com/");
        host.inject_script(tab, "content-script.js").await.unwrap();
        host.inject_script(tab, "content-script.js").await.unwrap();
        assert!(host.send_message(tab, StorageRequest::ping().to_value()).await.is_ok());

        let err = host.inject_script(tab, "evil.js").await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Other);
    }

    #[tokio::test]
    async fn navigation_requires_reinstall_and_keeps_local_storage() {
        let host = Arc::new(LocalHost::new());
        let tab = host.open_tab("https://example.com/");
        let c = client(&host);

        c.ensure_ready(tab).await.unwrap();
        c.set(tab, StorageScope::Local, "k", "local").await.unwrap();
        c.set(tab, StorageScope::Session, "k", "session").await.unwrap();

        host.navigate(tab, "https://example.com/other").await.unwrap();
        let err = c.get_all(tab, StorageScope::Local).await.unwrap_err();
        assert!(err.is_transient());

        c.ensure_ready(tab).await.unwrap();
        let local = c.get_all(tab, StorageScope::Local).await.unwrap();
        let session = c.get_all(tab, StorageScope::Session).await.unwrap();
        assert_eq!(local["items"][0]["value"], "local");
        assert_eq!(session["items"], json!([]));
    }

    #[tokio::test]
    async fn fingerprinted_responder_is_resolved_from_manifest() {
        let manifest = Manifest {
            content_scripts: vec![ContentScript { js: vec!["assets/content-script.9f8e.js".into()] }],
        };
        let host = Arc::new(LocalHost::new().with_manifest(manifest, "assets/content-script.9f8e.js"));
        let tab = host.open_tab("https://example.com/");

        client(&host).ensure_ready(tab).await.unwrap();
    }

    #[tokio::test]
    async fn active_tab_tracks_open_and_close() {
        let host = LocalHost::new();
        assert!(host.active_tab().await.unwrap().is_none());

        let blank = host.open_blank_tab();
        assert_eq!(host.active_tab().await.unwrap().unwrap().url, None);

        let tab = host.open_tab("https://example.com/");
        let info = host.active_tab().await.unwrap().unwrap();
        assert_eq!(info.id, tab);
        assert_eq!(info.url.as_deref(), Some("https://example.com/"));

        host.activate(blank).unwrap();
        host.close_tab(blank);
        assert!(host.active_tab().await.unwrap().is_none());
    }
}
