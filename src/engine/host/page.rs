//! One page context: its own task, its own storage, its own message bus.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::bridge::{MessageListener, StorageResponder, TransportError};
use crate::storage::{InMemoryStorageArea, StorageArea, StorageHandles};
use crate::tab::TabId;

pub(crate) const NO_LISTENER: &str = "Could not establish connection. Receiving end does not exist.";

/// Local storage is per origin and outlives navigation; shared by every page of a host.
pub(crate) type OriginStorage = Arc<Mutex<HashMap<String, Arc<dyn StorageArea>>>>;

#[derive(Debug)]
pub(crate) enum PageCommand {
    Deliver {
        message: Value,
        reply: oneshot::Sender<Result<Value, TransportError>>,
    },
    InjectScript {
        path: String,
        reply: oneshot::Sender<Result<(), TransportError>>,
    },
    Navigate {
        url: Option<String>,
        reply: oneshot::Sender<()>,
    },
    Describe {
        reply: oneshot::Sender<PageInfo>,
    },
}

#[derive(Debug, Clone)]
pub struct PageInfo {
    pub url: Option<String>,
    pub origin: String,
    pub storage: StorageHandles,
    pub responder_installed: bool,
}

/// State of the current page load.
struct PageContext {
    url: Option<String>,
    origin: String,
    storage: StorageHandles,
    listeners: Vec<Arc<dyn MessageListener>>,
    responder_installed: bool,
}

impl PageContext {
    fn load(url: Option<String>, origins: &OriginStorage) -> Self {
        let origin = url
            .as_deref()
            .and_then(|u| Url::parse(u).ok())
            .map(|u| u.origin().ascii_serialization())
            .unwrap_or_else(|| "null".to_string());

        let local = match origins.lock() {
            Ok(mut map) => map
                .entry(origin.clone())
                .or_insert_with(|| Arc::new(InMemoryStorageArea::new()))
                .clone(),
            Err(_) => {
                log::error!("origin storage lock poisoned, page {origin} gets a detached local area");
                Arc::new(InMemoryStorageArea::new())
            }
        };

        Self {
            url,
            origin,
            storage: StorageHandles::new(local, Arc::new(InMemoryStorageArea::new())),
            listeners: Vec::new(),
            responder_installed: false,
        }
    }
}

pub(crate) struct PageWorker {
    tab: TabId,
    cmd_rx: mpsc::Receiver<PageCommand>,
    responder_script: String,
    origins: OriginStorage,
    context: PageContext,
}

impl PageWorker {
    pub(crate) fn new(
        tab: TabId,
        url: Option<String>,
        cmd_rx: mpsc::Receiver<PageCommand>,
        responder_script: String,
        origins: OriginStorage,
    ) -> Self {
        let context = PageContext::load(url, &origins);
        Self { tab, cmd_rx, responder_script, origins, context }
    }

    pub(crate) async fn run(mut self) {
        while let Some(cmd) = self.cmd_rx.recv().await {
            self.handle_command(cmd);
        }
        log::debug!("page worker for tab {} stopped", self.tab);
    }

    fn handle_command(&mut self, cmd: PageCommand) {
        match cmd {
            PageCommand::Deliver { message, reply } => {
                let _ = reply.send(self.deliver(&message));
            }
            PageCommand::InjectScript { path, reply } => {
                let _ = reply.send(self.inject(&path));
            }
            PageCommand::Navigate { url, reply } => {
                log::debug!("tab {} navigating to {:?}", self.tab, url);
                self.context = PageContext::load(url, &self.origins);
                let _ = reply.send(());
            }
            PageCommand::Describe { reply } => {
                let _ = reply.send(PageInfo {
                    url: self.context.url.clone(),
                    origin: self.context.origin.clone(),
                    storage: self.context.storage.clone(),
                    responder_installed: self.context.responder_installed,
                });
            }
        }
    }

    /// First listener that accepts the message answers it.
    fn deliver(&self, message: &Value) -> Result<Value, TransportError> {
        self.context
            .listeners
            .iter()
            .find_map(|l| l.on_message(message))
            .ok_or_else(|| TransportError::no_listener(NO_LISTENER))
    }

    fn inject(&mut self, path: &str) -> Result<(), TransportError> {
        if path != self.responder_script {
            return Err(TransportError::other(format!("Could not load file: '{path}'.")));
        }
        if self.context.responder_installed {
            log::debug!("responder already installed on tab {}", self.tab);
            return Ok(());
        }

        let responder = StorageResponder::new(self.context.origin.clone(), self.context.storage.clone());
        self.context.listeners.push(Arc::new(responder));
        self.context.responder_installed = true;
        Ok(())
    }
}

/// Cheap, clonable way to talk to a [`PageWorker`].
#[derive(Clone)]
pub(crate) struct PageHandle {
    tab: TabId,
    cmd_tx: mpsc::Sender<PageCommand>,
}

impl PageHandle {
    pub(crate) fn new(tab: TabId, cmd_tx: mpsc::Sender<PageCommand>) -> Self {
        Self { tab, cmd_tx }
    }

    fn gone(&self) -> TransportError {
        TransportError::unreachable(format!("No tab with id: {}.", self.tab))
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> PageCommand) -> Result<T, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(make(tx)).await.map_err(|_| self.gone())?;
        rx.await.map_err(|_| self.gone())
    }

    pub(crate) async fn deliver(&self, message: Value) -> Result<Value, TransportError> {
        self.request(|reply| PageCommand::Deliver { message, reply }).await?
    }

    pub(crate) async fn inject_script(&self, path: &str) -> Result<(), TransportError> {
        let path = path.to_string();
        self.request(|reply| PageCommand::InjectScript { path, reply }).await?
    }

    pub(crate) async fn navigate(&self, url: Option<String>) -> Result<(), TransportError> {
        self.request(|reply| PageCommand::Navigate { url, reply }).await
    }

    pub(crate) async fn describe(&self) -> Result<PageInfo, TransportError> {
        self.request(|reply| PageCommand::Describe { reply }).await
    }
}
