//! The page side of the bridge.
//!
//! [`StorageResponder`] runs inside a page context and answers storage envelopes against that
//! page's local and session areas. It keeps no state between calls.

use serde_json::{json, Value};

use crate::bridge::contract::{create_error, create_success, StorageAction, StorageRequest, StorageResponse};
use crate::storage::{StorageHandles, StorageScope};

const INVALID_AREA: &str = "Invalid storage area.";
const KEY_REQUIRED: &str = "Storage key is required.";

/// Something registered on a page's message bus. Every message from every sender reaches
/// every listener; returning `None` declines the message.
pub trait MessageListener: Send + Sync {
    fn on_message(&self, message: &Value) -> Option<Value>;
}

pub struct StorageResponder {
    origin: String,
    storage: StorageHandles,
}

impl StorageResponder {
    pub fn new(origin: impl Into<String>, storage: StorageHandles) -> Self {
        Self { origin: origin.into(), storage }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn handle(&self, request: &StorageRequest) -> StorageResponse {
        if request.action == StorageAction::Ping {
            return create_success(json!({ "ready": true, "origin": self.origin }));
        }

        let Some(scope) = request.storage_area else {
            return create_error(INVALID_AREA);
        };

        match self.execute(request, scope) {
            Ok(response) => response,
            Err(e) => {
                log::warn!("storage {} on {scope} failed: {e:#}", request.action);
                create_error(e.to_string())
            }
        }
    }

    fn execute(&self, request: &StorageRequest, scope: StorageScope) -> anyhow::Result<StorageResponse> {
        let area = self.storage.area(scope);

        let response = match request.action {
            StorageAction::Ping => create_success(json!({ "ready": true, "origin": self.origin })),
            StorageAction::GetAll => create_success(json!({
                "origin": self.origin,
                "storageArea": scope,
                "items": area.entries(),
            })),
            StorageAction::Set => {
                let Some(key) = request.payload_key() else {
                    return Ok(create_error(KEY_REQUIRED));
                };
                let value = request.payload_value();
                area.set_item(key, value)?;
                create_success(json!({ "origin": self.origin, "storageArea": scope, "key": key, "value": value }))
            }
            StorageAction::Remove => {
                let Some(key) = request.payload_key() else {
                    return Ok(create_error(KEY_REQUIRED));
                };
                area.remove_item(key)?;
                create_success(json!({ "origin": self.origin, "storageArea": scope, "key": key }))
            }
            StorageAction::Clear => {
                area.clear()?;
                create_success(json!({ "origin": self.origin, "storageArea": scope, "cleared": true }))
            }
        };
        Ok(response)
    }
}

impl MessageListener for StorageResponder {
    fn on_message(&self, message: &Value) -> Option<Value> {
        let request = StorageRequest::from_value(message)?;
        Some(self.handle(&request).to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use anyhow::anyhow;
    use serde_json::Map;

    use crate::bridge::contract::create_request;
    use crate::storage::{InMemoryStorageArea, StorageArea};

    fn responder() -> StorageResponder {
        let storage = StorageHandles::new(
            Arc::new(InMemoryStorageArea::with_items([("token", "abc")])),
            Arc::new(InMemoryStorageArea::new()),
        );
        StorageResponder::new("https://example.com", storage)
    }

    fn payload(pairs: &[(&str, Value)]) -> Option<Map<String, Value>> {
        Some(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn ping_reports_origin() {
        let response = responder().handle(&StorageRequest::ping());
        assert_eq!(
            response,
            create_success(json!({ "ready": true, "origin": "https://example.com" }))
        );
    }

    #[test]
    fn get_all_lists_entries() {
        let response = responder().handle(&create_request(StorageAction::GetAll, Some(StorageScope::Local), None));
        assert_eq!(
            response.to_value(),
            json!({
                "channel": crate::bridge::contract::STORAGE_CHANNEL,
                "ok": true,
                "data": {
                    "origin": "https://example.com",
                    "storageArea": "localStorage",
                    "items": [{ "key": "token", "value": "abc" }],
                }
            })
        );
    }

    #[test]
    fn missing_area_is_rejected() {
        let response = responder().handle(&create_request(StorageAction::GetAll, None, None));
        assert_eq!(response, create_error("Invalid storage area."));
    }

    #[test]
    fn set_remove_clear() {
        let r = responder();
        let set = r.handle(&create_request(
            StorageAction::Set,
            Some(StorageScope::Session),
            payload(&[("key", json!("k")), ("value", json!("v"))]),
        ));
        assert!(matches!(set, StorageResponse::Success { .. }));
        assert_eq!(r.storage.session.get_item("k").as_deref(), Some("v"));

        let missing_key = r.handle(&create_request(StorageAction::Remove, Some(StorageScope::Session), payload(&[("key", json!(""))])));
        assert_eq!(missing_key, create_error("Storage key is required."));

        r.handle(&create_request(StorageAction::Remove, Some(StorageScope::Session), payload(&[("key", json!("k"))])));
        assert!(r.storage.session.is_empty());

        let cleared = r.handle(&create_request(StorageAction::Clear, Some(StorageScope::Local), None));
        assert_eq!(cleared.to_value()["data"]["cleared"], true);
        assert!(r.storage.local.is_empty());
    }

    struct BrokenArea;

    impl StorageArea for BrokenArea {
        fn get_item(&self, _key: &str) -> Option<String> { None }
        fn set_item(&self, _key: &str, _value: &str) -> anyhow::Result<()> { Err(anyhow!("QuotaExceededError")) }
        fn remove_item(&self, _key: &str) -> anyhow::Result<()> { Ok(()) }
        fn clear(&self) -> anyhow::Result<()> { Ok(()) }
        fn len(&self) -> usize { 0 }
        fn keys(&self) -> Vec<String> { vec![] }
    }

    #[test]
    fn backend_errors_become_failures() {
        let r = StorageResponder::new(
            "https://example.com",
            StorageHandles::new(Arc::new(BrokenArea), Arc::new(InMemoryStorageArea::new())),
        );
        let response = r.handle(&create_request(
            StorageAction::Set,
            Some(StorageScope::Local),
            payload(&[("key", json!("k"))]),
        ));
        assert_eq!(response, create_error("QuotaExceededError"));
    }

    #[test]
    fn listener_declines_foreign_messages() {
        let r = responder();
        assert!(r.on_message(&json!({ "type": "something-else" })).is_none());
        let reply = r.on_message(&StorageRequest::ping().to_value()).unwrap();
        assert_eq!(reply["ok"], true);
    }
}
