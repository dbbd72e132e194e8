//! Profile records and the persisted profile list.

use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock;
use crate::cookies::Cookie;
use crate::profile::ProfileError;
use crate::storage::transfer::{entries_from_values, normalize_entries};
use crate::storage::{StorageArea, StorageEntry};

pub const PROFILE_KIND: &str = "cookie-snatcher-profile";
pub const PROFILE_VERSION: u32 = 1;

const ID_SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A named capture of cookies plus both storage areas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    pub kind: String,
    pub version: u32,
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    pub cookies: Vec<Cookie>,
    pub local_storage_entries: Vec<StorageEntry>,
    pub session_storage_entries: Vec<StorageEntry>,
}

/// Everything needed to build a [`ProfileRecord`]. Missing ids and timestamps are generated.
#[derive(Debug, Clone, Default)]
pub struct ProfileInput {
    pub id: Option<String>,
    pub name: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub cookies: Vec<Cookie>,
    pub local_storage_entries: Vec<StorageEntry>,
    pub session_storage_entries: Vec<StorageEntry>,
}

/// The live or stored state a profile captures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileState {
    pub cookies: Vec<Cookie>,
    pub local_storage_entries: Vec<StorageEntry>,
    pub session_storage_entries: Vec<StorageEntry>,
}

impl ProfileRecord {
    pub fn state(&self) -> ProfileState {
        ProfileState {
            cookies: self.cookies.clone(),
            local_storage_entries: self.local_storage_entries.clone(),
            session_storage_entries: self.session_storage_entries.clone(),
        }
    }
}

/// Builds a record: trims and requires the name, deduplicates storage entries by key
/// (last write wins), fills in a fresh id and timestamps where missing.
pub fn create_profile_record(input: ProfileInput) -> Result<ProfileRecord, ProfileError> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(ProfileError::NameRequired);
    }

    let now = clock::now_iso();
    let id = input.id.filter(|id| !id.trim().is_empty()).unwrap_or_else(create_profile_id);

    Ok(ProfileRecord {
        kind: PROFILE_KIND.to_string(),
        version: PROFILE_VERSION,
        id,
        name: name.to_string(),
        created_at: input.created_at.filter(|s| !s.is_empty()).unwrap_or_else(|| now.clone()),
        updated_at: input.updated_at.filter(|s| !s.is_empty()).unwrap_or(now),
        cookies: input.cookies,
        local_storage_entries: normalize_entries(input.local_storage_entries),
        session_storage_entries: normalize_entries(input.session_storage_entries),
    })
}

/// `profile_<unix millis>_<6 base36 chars>`.
pub fn create_profile_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .map(|_| ID_SUFFIX_ALPHABET[rng.random_range(0..ID_SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("profile_{}_{suffix}", clock::now_millis())
}

/// Kind/version tag plus the presence and type of every required field.
pub fn is_profile_record(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };

    obj.get("kind").and_then(Value::as_str) == Some(PROFILE_KIND)
        && obj.get("version").and_then(Value::as_u64) == Some(PROFILE_VERSION as u64)
        && ["id", "name", "createdAt", "updatedAt"]
            .iter()
            .all(|field| obj.get(*field).is_some_and(Value::is_string))
        && ["cookies", "localStorageEntries", "sessionStorageEntries"]
            .iter()
            .all(|field| obj.get(*field).is_some_and(Value::is_array))
}

/// Parses cookie records out of untrusted JSON, dropping the ones that are not cookies.
pub(crate) fn cookies_from_values(raw: &[Value]) -> Vec<Cookie> {
    let cookies: Vec<Cookie> = raw.iter().filter_map(Cookie::deserialize_record).collect();
    if cookies.len() < raw.len() {
        log::warn!("dropped {} malformed cookie record(s)", raw.len() - cookies.len());
    }
    cookies
}

fn array<'a>(value: &'a Value, field: &str) -> &'a [Value] {
    value.get(field).and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default()
}

/// Reads a persisted record that already passed [`is_profile_record`].
fn record_from_value(value: &Value) -> Option<ProfileRecord> {
    let text = |field: &str| value.get(field).and_then(Value::as_str).map(str::to_string);

    Some(ProfileRecord {
        kind: PROFILE_KIND.to_string(),
        version: PROFILE_VERSION,
        id: text("id")?,
        name: text("name")?,
        created_at: text("createdAt")?,
        updated_at: text("updatedAt")?,
        cookies: cookies_from_values(array(value, "cookies")),
        local_storage_entries: entries_from_values(array(value, "localStorageEntries")),
        session_storage_entries: entries_from_values(array(value, "sessionStorageEntries")),
    })
}

/// The persisted profile list, stored as a JSON array under one key.
pub struct ProfileStore<'a> {
    area: &'a dyn StorageArea,
    key: &'a str,
}

impl<'a> ProfileStore<'a> {
    pub fn new(area: &'a dyn StorageArea, key: &'a str) -> Self {
        Self { area, key }
    }

    /// Every valid record. A missing or corrupt list reads as empty; records failing the shape
    /// check are skipped.
    pub fn load(&self) -> Vec<ProfileRecord> {
        let Some(raw) = self.area.get_item(self.key) else {
            return Vec::new();
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => items
                .iter()
                .filter(|v| is_profile_record(v))
                .filter_map(record_from_value)
                .collect(),
            Ok(_) => {
                log::warn!("profile list under {} is not an array, ignoring it", self.key);
                Vec::new()
            }
            Err(e) => {
                log::warn!("profile list under {} is unreadable: {e}", self.key);
                Vec::new()
            }
        }
    }

    /// Records ordered by `updatedAt`, newest first.
    pub fn load_sorted(&self) -> Vec<ProfileRecord> {
        let mut records = self.load();
        records.sort_by_key(|r| std::cmp::Reverse(clock::parse_unix_seconds(&r.updated_at).unwrap_or(i64::MIN)));
        records
    }

    pub fn save(&self, records: &[ProfileRecord]) -> Result<()> {
        self.area.set_item(self.key, &serde_json::to_string(records)?)
    }

    pub fn find_by_id(&self, id: &str) -> Option<ProfileRecord> {
        self.load().into_iter().find(|r| r.id == id)
    }

    /// Case-insensitive name lookup; names are not unique, the newest match wins.
    pub fn find_by_name(&self, name: &str) -> Option<ProfileRecord> {
        let name = name.trim().to_lowercase();
        self.load_sorted().into_iter().find(|r| r.name.to_lowercase() == name)
    }

    /// Inserts `profile`, or replaces the record with the same id keeping its `createdAt` and
    /// refreshing `updatedAt`. Returns the resulting list.
    pub fn upsert(&self, profile: ProfileRecord) -> Result<Vec<ProfileRecord>> {
        let mut records = self.load();
        match records.iter().position(|r| r.id == profile.id) {
            Some(pos) => {
                let created_at = records[pos].created_at.clone();
                records[pos] = ProfileRecord { created_at, updated_at: clock::now_iso(), ..profile };
            }
            None => records.push(profile),
        }
        self.save(&records)?;
        Ok(records)
    }

    pub fn remove(&self, id: &str) -> Result<Vec<ProfileRecord>> {
        let records: Vec<_> = self.load().into_iter().filter(|r| r.id != id).collect();
        self.save(&records)?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorageArea;

    const KEY: &str = "cookieSnatcher.profiles.v1";

    fn input(name: &str) -> ProfileInput {
        ProfileInput {
            name: name.into(),
            cookies: vec![Cookie::new("sid", "1", "example.com")],
            local_storage_entries: vec![
                StorageEntry::new("a", "1"),
                StorageEntry::new("b", "2"),
                StorageEntry::new("a", "3"),
                StorageEntry::new(" ", "blank"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn create_trims_name_and_dedups() {
        let record = create_profile_record(input("  Work  ")).unwrap();
        assert_eq!(record.name, "Work");
        assert_eq!(record.kind, PROFILE_KIND);
        assert!(record.id.starts_with("profile_"));
        assert_eq!(record.id.rsplit('_').next().unwrap().len(), 6);
        assert_eq!(
            record.local_storage_entries,
            vec![StorageEntry::new("a", "3"), StorageEntry::new("b", "2")]
        );
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn name_is_required() {
        let err = create_profile_record(input("   ")).unwrap_err();
        assert_eq!(err.to_string(), "Profile name is required.");
    }

    #[test]
    fn ids_are_distinct() {
        assert_ne!(create_profile_id(), create_profile_id());
    }

    #[test]
    fn store_roundtrip_upsert_remove() {
        let area = InMemoryStorageArea::new();
        let store = ProfileStore::new(&area, KEY);
        assert!(store.load().is_empty());

        let mut first = create_profile_record(input("Work")).unwrap();
        first.created_at = "2020-01-01T00:00:00.000Z".into();
        store.upsert(first.clone()).unwrap();
        store.upsert(create_profile_record(input("Home")).unwrap()).unwrap();
        assert_eq!(store.load().len(), 2);

        let mut replacement = first.clone();
        replacement.name = "Work v2".into();
        replacement.created_at = "2099-01-01T00:00:00.000Z".into();
        let records = store.upsert(replacement).unwrap();
        let updated = records.iter().find(|r| r.id == first.id).unwrap();
        assert_eq!(updated.name, "Work v2");
        assert_eq!(updated.created_at, "2020-01-01T00:00:00.000Z");
        assert_eq!(store.find_by_name("work V2").unwrap().id, first.id);

        let remaining = store.remove(&first.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(store.find_by_id(&first.id).is_none());
    }

    #[test]
    fn load_skips_invalid_records() {
        let valid = serde_json::to_value(create_profile_record(input("Ok")).unwrap()).unwrap();
        let list = serde_json::json!([valid, { "kind": PROFILE_KIND, "version": 1, "name": "no id" }, 42]);
        let area = InMemoryStorageArea::with_items([(KEY, list.to_string().as_str()), ("bad", "nope")]);

        assert_eq!(ProfileStore::new(&area, KEY).load().len(), 1);
        assert!(ProfileStore::new(&area, "bad").load().is_empty());
    }
}
