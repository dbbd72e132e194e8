//! The panel side of the bridge.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::bridge::contract::{create_request, StorageAction, StorageResponse, DEFAULT_FAILURE_MESSAGE};
use crate::bridge::transport::{resolve_responder_script_path, BridgeTransport};
use crate::bridge::BridgeError;
use crate::config::EngineConfig;
use crate::storage::StorageScope;
use crate::tab::TabId;

/// Sends storage envelopes to a page and installs the responder on demand.
///
/// Every call is a single request/response round trip; only [`BridgeClient::ensure_ready`]
/// makes a second attempt.
#[derive(Clone)]
pub struct BridgeClient {
    transport: Arc<dyn BridgeTransport>,
    script_marker: String,
    default_script: String,
}

impl BridgeClient {
    pub fn new(transport: Arc<dyn BridgeTransport>, config: &EngineConfig) -> Self {
        Self {
            transport,
            script_marker: config.responder_script_marker.clone(),
            default_script: config.default_responder_script.clone(),
        }
    }

    /// Pings the page; if that fails for any reason, injects the responder and pings once more.
    pub async fn ensure_ready(&self, target: TabId) -> Result<Value, BridgeError> {
        match self.send(target, StorageAction::Ping, None, None).await {
            Ok(data) => Ok(data),
            Err(e) => {
                log::debug!("storage bridge not ready on tab {target} ({e}), injecting responder");
                self.inject_responder(target).await?;
                self.send(target, StorageAction::Ping, None, None).await
            }
        }
    }

    pub async fn get_all(&self, target: TabId, area: StorageScope) -> Result<Value, BridgeError> {
        self.send(target, StorageAction::GetAll, Some(area), None).await
    }

    pub async fn set(&self, target: TabId, area: StorageScope, key: &str, value: &str) -> Result<Value, BridgeError> {
        let payload = json!({ "key": key, "value": value });
        self.send(target, StorageAction::Set, Some(area), as_map(payload)).await
    }

    pub async fn remove(&self, target: TabId, area: StorageScope, key: &str) -> Result<Value, BridgeError> {
        let payload = json!({ "key": key });
        self.send(target, StorageAction::Remove, Some(area), as_map(payload)).await
    }

    pub async fn clear(&self, target: TabId, area: StorageScope) -> Result<Value, BridgeError> {
        self.send(target, StorageAction::Clear, Some(area), None).await
    }

    async fn inject_responder(&self, target: TabId) -> Result<(), BridgeError> {
        let manifest = self.transport.manifest();
        let path = resolve_responder_script_path(manifest.as_ref(), &self.script_marker, &self.default_script);
        self.transport.inject_script(target, &path).await?;
        Ok(())
    }

    async fn send(
        &self,
        target: TabId,
        action: StorageAction,
        area: Option<StorageScope>,
        payload: Option<Map<String, Value>>,
    ) -> Result<Value, BridgeError> {
        let request = create_request(action, area, payload);
        let reply = self.transport.send_message(target, request.to_value()).await?;

        match StorageResponse::from_value(&reply) {
            Some(StorageResponse::Success { data }) => Ok(data),
            Some(StorageResponse::Failure { error }) if error.is_empty() => {
                Err(BridgeError::Remote(DEFAULT_FAILURE_MESSAGE.to_string()))
            }
            Some(StorageResponse::Failure { error }) => Err(BridgeError::Remote(error)),
            None => Err(BridgeError::InvalidResponse),
        }
    }
}

fn as_map(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
