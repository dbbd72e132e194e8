//! Versioned profile export/import.
//!
//! Version 2 nests the captured state under `profile.state`. Version 1 payloads, either wrapped
//! in a v1 export envelope or a bare persisted record, are migrated on import. Both paths rebuild
//! the record through [`create_profile_record`], so an imported profile obeys the same name and
//! storage-entry rules as one saved locally.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::clock;
use crate::cookies::Cookie;
use crate::profile::record::{cookies_from_values, create_profile_record, ProfileInput, ProfileRecord, PROFILE_KIND};
use crate::profile::ProfileError;
use crate::storage::transfer::entries_from_values;
use crate::storage::StorageEntry;

pub const PROFILE_EXPORT_KIND: &str = "cookie-snatcher-profile-export";
pub const PROFILE_EXPORT_VERSION: u32 = 2;

const LEGACY_EXPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileExportPayload {
    pub kind: &'static str,
    pub version: u32,
    pub exported_at: String,
    pub profile: ExportedProfile,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedProfile {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    pub state: ExportedState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedState {
    pub cookies: Vec<Cookie>,
    pub storage: ExportedStorage,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportedStorage {
    #[serde(rename = "localStorage")]
    pub local_storage: Vec<StorageEntry>,
    #[serde(rename = "sessionStorage")]
    pub session_storage: Vec<StorageEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileImport {
    /// `Some(1)` when the payload was in the legacy shape.
    pub migrated_from_version: Option<u32>,
    pub profile: ProfileRecord,
}

pub fn export_payload(profile: &ProfileRecord) -> ProfileExportPayload {
    ProfileExportPayload {
        kind: PROFILE_EXPORT_KIND,
        version: PROFILE_EXPORT_VERSION,
        exported_at: clock::now_iso(),
        profile: ExportedProfile {
            id: profile.id.clone(),
            name: profile.name.clone(),
            created_at: profile.created_at.clone(),
            updated_at: profile.updated_at.clone(),
            state: ExportedState {
                cookies: profile.cookies.clone(),
                storage: ExportedStorage {
                    local_storage: profile.local_storage_entries.clone(),
                    session_storage: profile.session_storage_entries.clone(),
                },
            },
        },
    }
}

pub fn import_payload(raw: &Value) -> Result<ProfileImport, ProfileError> {
    let candidate = raw.as_object().ok_or(ProfileError::NotAnObject)?;
    let kind = candidate.get("kind").and_then(Value::as_str);
    let version = candidate.get("version").and_then(Value::as_u64);

    if kind == Some(PROFILE_EXPORT_KIND) && version == Some(PROFILE_EXPORT_VERSION as u64) {
        return Ok(ProfileImport {
            migrated_from_version: None,
            profile: normalize_v2(candidate.get("profile"))?,
        });
    }

    let legacy = match kind {
        Some(PROFILE_EXPORT_KIND) if version == Some(LEGACY_EXPORT_VERSION as u64) => {
            candidate.get("profile").filter(|p| !p.is_null())
        }
        Some(PROFILE_KIND) => Some(raw),
        _ => None,
    };

    match legacy {
        Some(profile) => {
            log::info!("migrating v{LEGACY_EXPORT_VERSION} profile payload");
            Ok(ProfileImport {
                migrated_from_version: Some(LEGACY_EXPORT_VERSION),
                profile: normalize_v1(profile)?,
            })
        }
        None => Err(ProfileError::Unsupported),
    }
}

fn normalize_v2(profile: Option<&Value>) -> Result<ProfileRecord, ProfileError> {
    let profile = profile.and_then(Value::as_object).ok_or(ProfileError::InvalidV2Payload)?;
    let state = profile.get("state").and_then(Value::as_object).ok_or(ProfileError::InvalidV2State)?;
    let storage = state.get("storage").and_then(Value::as_object).ok_or(ProfileError::InvalidV2Storage)?;

    create_profile_record(ProfileInput {
        cookies: cookies_from_values(array(state, "cookies")),
        local_storage_entries: entries_from_values(array(storage, "localStorage")),
        session_storage_entries: entries_from_values(array(storage, "sessionStorage")),
        ..header(profile)
    })
}

fn normalize_v1(profile: &Value) -> Result<ProfileRecord, ProfileError> {
    let legacy = profile.as_object().ok_or(ProfileError::InvalidV1Payload)?;

    create_profile_record(ProfileInput {
        cookies: cookies_from_values(array(legacy, "cookies")),
        local_storage_entries: entries_from_values(array(legacy, "localStorageEntries")),
        session_storage_entries: entries_from_values(array(legacy, "sessionStorageEntries")),
        ..header(legacy)
    })
}

/// Id, name and timestamps; anything that is not a string is treated as absent.
fn header(obj: &Map<String, Value>) -> ProfileInput {
    let text = |field: &str| obj.get(field).and_then(Value::as_str).map(str::to_string);

    ProfileInput {
        id: text("id"),
        name: text("name").unwrap_or_default(),
        created_at: text("createdAt"),
        updated_at: text("updatedAt"),
        ..Default::default()
    }
}

fn array<'a>(obj: &'a Map<String, Value>, field: &str) -> &'a [Value] {
    obj.get(field).and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default()
}
