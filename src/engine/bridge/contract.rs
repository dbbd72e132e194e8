//! Wire envelopes for the storage channel.
//!
//! A request looks like
//! `{ "channel": "cookie-snatcher-storage-v1", "action": "storage.getAll", "storageArea": "localStorage", "payload": {} }`
//! and a response is either `{ channel, ok: true, data }` or `{ channel, ok: false, error }`.
//! Every message on the host bus reaches every listener, so anything without the exact
//! channel tag is not ours and must be ignored.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::storage::StorageScope;

pub const STORAGE_CHANNEL: &str = "cookie-snatcher-storage-v1";
pub const DEFAULT_FAILURE_MESSAGE: &str = "Storage operation failed.";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageAction {
    #[serde(rename = "storage.ping")]
    Ping,
    #[serde(rename = "storage.getAll")]
    GetAll,
    #[serde(rename = "storage.set")]
    Set,
    #[serde(rename = "storage.remove")]
    Remove,
    #[serde(rename = "storage.clear")]
    Clear,
}

impl StorageAction {
    pub const ALL: [StorageAction; 5] = [
        StorageAction::Ping,
        StorageAction::GetAll,
        StorageAction::Set,
        StorageAction::Remove,
        StorageAction::Clear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageAction::Ping => "storage.ping",
            StorageAction::GetAll => "storage.getAll",
            StorageAction::Set => "storage.set",
            StorageAction::Remove => "storage.remove",
            StorageAction::Clear => "storage.clear",
        }
    }
}

impl Display for StorageAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StorageAction::ALL.into_iter().find(|a| a.as_str() == s).ok_or(())
    }
}

pub fn is_storage_area(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.parse::<StorageScope>().is_ok())
}

pub fn is_storage_action(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.parse::<StorageAction>().is_ok())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageRequest {
    pub channel: String,
    pub action: StorageAction,
    /// `None` is sent as `null` and is only meaningful for PING. The field must be present.
    #[serde(deserialize_with = "required_area")]
    pub storage_area: Option<StorageScope>,
    pub payload: Map<String, Value>,
}

fn required_area<'de, D: Deserializer<'de>>(d: D) -> Result<Option<StorageScope>, D::Error> {
    Option::<StorageScope>::deserialize(d)
}

impl StorageRequest {
    pub fn new(action: StorageAction, storage_area: Option<StorageScope>, payload: Map<String, Value>) -> Self {
        Self { channel: STORAGE_CHANNEL.to_string(), action, storage_area, payload }
    }

    pub fn ping() -> Self {
        Self::new(StorageAction::Ping, None, Map::new())
    }

    /// Reads a request off the bus. `None` for anything that is not a well-formed envelope
    /// on our channel.
    pub fn from_value(value: &Value) -> Option<Self> {
        let request = Self::deserialize(value).ok()?;
        (request.channel == STORAGE_CHANNEL).then_some(request)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// A non-empty string `key` from the payload.
    pub fn payload_key(&self) -> Option<&str> {
        self.payload.get("key").and_then(Value::as_str).filter(|k| !k.is_empty())
    }

    /// The string `value` from the payload, empty when missing or not a string.
    pub fn payload_value(&self) -> &str {
        self.payload.get("value").and_then(Value::as_str).unwrap_or_default()
    }
}

pub fn create_request(action: StorageAction, storage_area: Option<StorageScope>, payload: Option<Map<String, Value>>) -> StorageRequest {
    StorageRequest::new(action, storage_area, payload.unwrap_or_default())
}

pub fn is_request(value: &Value) -> bool {
    StorageRequest::from_value(value).is_some()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ResponseWire", try_from = "ResponseWire")]
pub enum StorageResponse {
    Success { data: Value },
    Failure { error: String },
}

#[derive(Serialize, Deserialize)]
struct ResponseWire {
    channel: String,
    ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    /// Only checked on failures; a success may carry anything here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<Value>,
}

impl From<StorageResponse> for ResponseWire {
    fn from(response: StorageResponse) -> Self {
        let channel = STORAGE_CHANNEL.to_string();
        match response {
            StorageResponse::Success { data } => ResponseWire { channel, ok: true, data: Some(data), error: None },
            StorageResponse::Failure { error } => {
                ResponseWire { channel, ok: false, data: None, error: Some(Value::String(error)) }
            }
        }
    }
}

impl TryFrom<ResponseWire> for StorageResponse {
    type Error = String;

    fn try_from(wire: ResponseWire) -> Result<Self, Self::Error> {
        if wire.channel != STORAGE_CHANNEL {
            return Err(format!("unexpected channel {}", wire.channel));
        }
        match (wire.ok, wire.error) {
            (true, _) => Ok(StorageResponse::Success { data: wire.data.unwrap_or(Value::Null) }),
            (false, Some(Value::String(error))) => Ok(StorageResponse::Failure { error }),
            (false, _) => Err("failure response without a string error".to_string()),
        }
    }
}

impl StorageResponse {
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

pub fn create_success(data: Value) -> StorageResponse {
    StorageResponse::Success { data }
}

/// A failure envelope. The error is never empty.
pub fn create_error(message: impl Into<String>) -> StorageResponse {
    let error = message.into();
    let error = if error.is_empty() { DEFAULT_FAILURE_MESSAGE.to_string() } else { error };
    StorageResponse::Failure { error }
}

pub fn is_response(value: &Value) -> bool {
    StorageResponse::from_value(value).is_some()
}
