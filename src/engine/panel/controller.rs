use std::sync::{Arc, RwLock};

use futures::future::{join_all, try_join};
use serde_json::Value;

use crate::bridge::{BridgeClient, BridgeError, BridgeTransport};
use crate::bulk_delete::{confirmation_phrase, create_plan, is_confirmation_valid, BulkDeletePlan, BulkDeleteType};
use crate::clock;
use crate::config::EngineConfig;
use crate::cookies::transfer::{create_cookie_import_plan, export_cookies_json};
use crate::cookies::{Cookie, CookieDescriptor, CookieError, CookieJar, PinnedCookies, RemovalDetails};
use crate::domain::{parse_domain_context, suggest_domain_for_cookie};
use crate::errors::EngineError;
use crate::panel::{PanelState, Scope, ViewTab};
use crate::profile::{
    create_profile_record, diff, export_payload, import_payload, ProfileDiff, ProfileError, ProfileExportPayload,
    ProfileImport, ProfileInput, ProfileRecord, ProfileState, ProfileStore,
};
use crate::snapshot::{build_restore_operations, create_snapshot, load_snapshot, save_snapshot, DeleteSnapshot};
use crate::storage::mutation::{normalize_mutation_input, plan_mutation, StorageMutation, StorageMutationInput};
use crate::storage::transfer::{create_export_payload, import_area_hint, parse_import_payload, StorageExportPayload};
use crate::storage::view::normalize_storage_entries;
use crate::storage::{StorageArea, StorageEntry, StorageScope};
use crate::tab::{TabId, TabQuery};

/// Shown instead of the raw transport message once transient bridge failures outlast the retry policy.
pub const STORAGE_INITIALIZING: &str = "Storage bridge is initializing for this tab. Please wait a moment.";
const STORAGE_LOAD_FAILED: &str = "Failed to load storage.";

/// Outcome of a best-effort batch. Failures never abort the rest of the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchReport {
    fn tally(outcomes: &[bool]) -> Self {
        let succeeded = outcomes.iter().filter(|ok| **ok).count();
        Self { succeeded, failed: outcomes.len() - succeeded }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub failed: usize,
    /// Snapshot entries that could not be turned into a cookie at all.
    pub skipped: usize,
}

/// Drives the host capabilities on behalf of the panel.
///
/// `persistence` is the panel's own key/value store (snapshot slot, profile list, pinned
/// cookies); page storage is only ever reached through the bridge.
pub struct Panel {
    config: EngineConfig,
    tabs: Arc<dyn TabQuery>,
    jar: Arc<dyn CookieJar>,
    bridge: BridgeClient,
    persistence: Arc<dyn StorageArea>,
    state: RwLock<PanelState>,
}

impl Panel {
    pub fn new(
        config: EngineConfig,
        tabs: Arc<dyn TabQuery>,
        jar: Arc<dyn CookieJar>,
        transport: Arc<dyn BridgeTransport>,
        persistence: Arc<dyn StorageArea>,
    ) -> Self {
        let pinned = PinnedCookies::load(persistence.as_ref(), &config.pinned_key);
        let pinned_storage = PinnedCookies::load(persistence.as_ref(), &config.pinned_storage_key);
        let state = PanelState::new(pinned, pinned_storage, config.page_size);
        let bridge = BridgeClient::new(transport, &config);

        Self { config, tabs, jar, bridge, persistence, state: RwLock::new(state) }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bridge(&self) -> &BridgeClient {
        &self.bridge
    }

    /// A copy of the current view state.
    pub fn state(&self) -> Result<PanelState, EngineError> {
        self.read(PanelState::clone)
    }

    fn read<R>(&self, f: impl FnOnce(&PanelState) -> R) -> Result<R, EngineError> {
        let guard = self.state.read().map_err(|_| EngineError::Internal)?;
        Ok(f(&*guard))
    }

    fn write<R>(&self, f: impl FnOnce(&mut PanelState) -> R) -> Result<R, EngineError> {
        let mut guard = self.state.write().map_err(|_| EngineError::Internal)?;
        Ok(f(&mut *guard))
    }

    fn is_current(&self, generation: u64) -> Result<bool, EngineError> {
        self.read(|s| s.generation == generation)
    }

    /// Applies `f` only while `generation` is still the latest refresh.
    fn commit(&self, generation: u64, f: impl FnOnce(&mut PanelState)) -> Result<bool, EngineError> {
        self.write(|s| {
            if s.generation != generation {
                log::debug!("discarding result of refresh {generation}, current is {}", s.generation);
                return false;
            }
            f(s);
            true
        })
    }

    pub fn set_scope(&self, scope: Scope) -> Result<(), EngineError> {
        self.write(|s| {
            s.scope = scope;
            s.page = 1;
        })
    }

    pub fn set_view(&self, view: ViewTab) -> Result<(), EngineError> {
        self.write(|s| {
            s.view = view;
            s.page = 1;
        })
    }

    pub fn set_search_term(&self, term: &str) -> Result<(), EngineError> {
        self.write(|s| {
            s.search_term = term.to_string();
            s.page = 1;
        })
    }

    pub fn set_page(&self, page: usize) -> Result<(), EngineError> {
        self.write(|s| s.page = page.max(1))
    }

    /// Re-resolves the active tab and reloads the data of the current scope. Returns the
    /// generation this refresh ran under.
    pub async fn refresh(&self) -> Result<u64, EngineError> {
        let generation = self.write(|s| {
            s.generation += 1;
            s.generation
        })?;

        let tab = match self.tabs.active_tab().await {
            Ok(tab) => tab,
            Err(e) => {
                log::error!("failed to query active tab: {e:#}");
                None
            }
        };

        let domain = parse_domain_context(tab.as_ref());
        let applied = self.commit(generation, |s| {
            s.domain = domain;
            s.tab_id = tab.map(|t| t.id);
        })?;

        if applied {
            self.fetch_active_scope_data(generation).await?;
        }
        Ok(generation)
    }

    pub async fn fetch_active_scope_data(&self, generation: u64) -> Result<(), EngineError> {
        if self.read(PanelState::is_cookie_scope)? {
            self.fetch_cookies(generation).await
        } else {
            self.fetch_storage_entries(generation).await
        }
    }

    /// A failed listing reads as an empty jar.
    pub async fn fetch_cookies(&self, generation: u64) -> Result<(), EngineError> {
        let cookies = match self.jar.list().await {
            Ok(cookies) => cookies,
            Err(e) => {
                log::error!("failed to fetch cookies: {e:#}");
                Vec::new()
            }
        };
        self.commit(generation, |s| s.cookies = Arc::new(cookies))?;
        Ok(())
    }

    /// Loads the current storage area through the bridge. Transient transport failures are
    /// retried per the configured policy; the outcome (entries or a load error) lands in the
    /// state unless a newer refresh started meanwhile.
    pub async fn fetch_storage_entries(&self, generation: u64) -> Result<(), EngineError> {
        let policy = self.config.bridge_retry;
        let mut attempt = 0;

        loop {
            let (tab, area, origin) = self.read(|s| {
                let tab = s.tab_id.filter(|_| s.domain.is_editable());
                let area = s.scope.storage_area().unwrap_or(StorageScope::Local);
                (tab, area, s.domain.origin())
            })?;

            let Some(tab) = tab else {
                self.commit(generation, |s| {
                    s.storage_entries = Arc::new(Vec::new());
                    s.storage_origin = origin;
                    s.storage_load_error = Some(EngineError::StorageUnavailable.to_string());
                })?;
                return Ok(());
            };

            let err = match self.load_area(tab, area).await {
                Ok(data) => {
                    let entries = normalize_storage_entries(&data);
                    let origin = data
                        .get("origin")
                        .and_then(Value::as_str)
                        .filter(|o| !o.is_empty())
                        .map(str::to_string)
                        .or(origin);
                    self.commit(generation, |s| {
                        s.storage_entries = Arc::new(entries);
                        s.storage_origin = origin;
                        s.storage_load_error = None;
                    })?;
                    return Ok(());
                }
                Err(err) => err,
            };

            if !self.is_current(generation)? {
                return Ok(());
            }

            let transient = err.is_transient();
            if transient && attempt < policy.max_retries {
                attempt += 1;
                log::debug!("storage bridge not ready on tab {tab}, retry {attempt}/{}", policy.max_retries);
                tokio::time::sleep(policy.delay).await;
                if !self.is_current(generation)? {
                    return Ok(());
                }
                continue;
            }

            let message = if transient {
                STORAGE_INITIALIZING.to_string()
            } else {
                log::warn!("storage bridge request failed: {err}");
                Some(err.to_string()).filter(|m| !m.is_empty()).unwrap_or_else(|| STORAGE_LOAD_FAILED.to_string())
            };
            self.commit(generation, |s| {
                s.storage_entries = Arc::new(Vec::new());
                s.storage_origin = origin;
                s.storage_load_error = Some(message);
            })?;
            return Ok(());
        }
    }

    async fn load_area(&self, tab: TabId, area: StorageScope) -> Result<Value, BridgeError> {
        self.bridge.ensure_ready(tab).await?;
        self.bridge.get_all(tab, area).await
    }

    async fn refetch_cookies(&self) -> Result<(), EngineError> {
        let generation = self.read(|s| s.generation)?;
        self.fetch_cookies(generation).await
    }

    async fn refetch_storage(&self) -> Result<(), EngineError> {
        let generation = self.read(|s| s.generation)?;
        self.fetch_storage_entries(generation).await
    }

    fn storage_target(&self) -> Result<(TabId, StorageScope), EngineError> {
        self.read(|s| {
            let Some(tab) = s.tab_id else {
                return Err(EngineError::NoActiveTab);
            };
            match (s.can_mutate_storage(), s.scope.storage_area()) {
                (true, Some(area)) => Ok((tab, area)),
                _ => Err(EngineError::StorageUnavailable),
            }
        })?
    }

    fn save_pinned(&self, pinned: &PinnedCookies) -> Result<(), EngineError> {
        pinned
            .save(self.persistence.as_ref(), &self.config.pinned_key)
            .map_err(EngineError::Persistence)
    }

    /// Flips the pin on `cookie` and persists the set. Returns the new state.
    pub fn toggle_pin(&self, cookie: &Cookie) -> Result<bool, EngineError> {
        let (pinned_now, pinned) = self.write(|s| (s.pinned.toggle(cookie), s.pinned.clone()))?;
        self.save_pinned(&pinned)?;
        Ok(pinned_now)
    }

    /// Flips the pin on a storage entry of the current area and persists the set. Returns the
    /// new state.
    pub fn toggle_storage_pin(&self, entry: &StorageEntry) -> Result<bool, EngineError> {
        let (pinned_now, pinned) = self.write(|s| {
            let key = s.storage_pin_key(entry).ok_or(EngineError::StorageUnavailable)?;
            Ok::<_, EngineError>((s.pinned_storage.toggle_key(&key), s.pinned_storage.clone()))
        })??;
        pinned
            .save(self.persistence.as_ref(), &self.config.pinned_storage_key)
            .map_err(EngineError::Persistence)?;
        Ok(pinned_now)
    }

    fn unpin_all<'a>(&self, cookies: impl IntoIterator<Item = &'a Cookie>) -> Result<(), EngineError> {
        let changed = self.write(|s| {
            let mut changed = false;
            for cookie in cookies {
                changed |= s.pinned.unpin(cookie);
            }
            changed.then(|| s.pinned.clone())
        })?;

        if let Some(pinned) = changed {
            self.save_pinned(&pinned)?;
        }
        Ok(())
    }

    async fn remove_cookie(&self, cookie: &Cookie) -> bool {
        let url = match cookie.url() {
            Ok(url) => url,
            Err(e) => {
                log::warn!("cannot remove cookie {}: {e}", cookie.storage_key());
                return false;
            }
        };

        match self.jar.remove(&url, &cookie.name, cookie.store_id.as_deref()).await {
            Ok(Some(_)) => true,
            Ok(None) => {
                log::warn!("failed to remove cookie {} (nothing removed)", cookie.storage_key());
                false
            }
            Err(e) => {
                log::error!("error removing cookie {}: {e:#}", cookie.storage_key());
                false
            }
        }
    }

    async fn set_cookie(&self, descriptor: &CookieDescriptor) -> bool {
        match self.jar.set(descriptor).await {
            Ok(Some(_)) => true,
            Ok(None) => {
                log::warn!("host refused cookie {}", descriptor.cookie.storage_key());
                false
            }
            Err(e) => {
                log::error!("error setting cookie {}: {e:#}", descriptor.cookie.storage_key());
                false
            }
        }
    }

    /// Creates or overwrites one cookie. A blank domain falls back to the current domain when
    /// that domain is editable.
    pub async fn save_cookie(&self, mut cookie: Cookie) -> Result<Cookie, EngineError> {
        cookie.name = cookie.name.trim().to_string();
        if cookie.name.is_empty() {
            return Err(EngineError::CookieNameRequired);
        }

        cookie.domain = cookie.domain.trim().to_string();
        if cookie.domain.is_empty() {
            let domain = self.read(|s| s.domain.clone())?;
            if !domain.is_editable() {
                return Err(CookieError::MissingDomain.into());
            }
            cookie.domain = suggest_domain_for_cookie(&domain.domain);
        }

        if let Some(expires) = cookie.expiration_date {
            if expires * 1000.0 <= clock::now_millis() as f64 {
                return Err(EngineError::ExpirationInPast);
            }
        }

        let descriptor = CookieDescriptor::from_cookie(cookie)?;
        let saved = self
            .jar
            .set(&descriptor)
            .await
            .map_err(EngineError::Host)?
            .ok_or(EngineError::CookieRejected)?;

        self.refetch_cookies().await?;
        Ok(saved)
    }

    pub async fn delete_cookie(&self, cookie: &Cookie) -> Result<RemovalDetails, EngineError> {
        let url = cookie.url()?;
        let details = self
            .jar
            .remove(&url, &cookie.name, cookie.store_id.as_deref())
            .await
            .map_err(EngineError::Host)?
            .ok_or(EngineError::CookieNotRemoved)?;

        self.unpin_all([cookie])?;
        self.refetch_cookies().await?;
        Ok(details)
    }

    /// Plans a bulk delete over the cookies currently shown.
    pub fn plan_bulk_delete(&self, kind: BulkDeleteType) -> Result<BulkDeletePlan, EngineError> {
        self.read(|s| create_plan(kind, &s.filtered_cookies(), &s.pinned))
    }

    /// Runs a confirmed plan. The snapshot is written before anything is removed; failing to
    /// write it does not stop the delete. Removals run concurrently and are tallied.
    pub async fn execute_bulk_delete(&self, plan: &BulkDeletePlan, confirmation: &str) -> Result<BatchReport, EngineError> {
        let expected = confirmation_phrase(plan);
        if !is_confirmation_valid(confirmation, &expected) {
            return Err(EngineError::ConfirmationMismatch(expected));
        }

        let snapshot = create_snapshot(&plan.target_cookies, plan.kind.as_str(), None);
        if let Err(e) = save_snapshot(self.persistence.as_ref(), &self.config.snapshot_key, &snapshot) {
            log::error!("failed to capture delete snapshot: {e:#}");
        }

        log::info!("deleting {} cookies ({})", plan.target_count, plan.kind);
        let outcomes = join_all(plan.target_cookies.iter().map(|c| self.remove_cookie(c))).await;
        let report = BatchReport::tally(&outcomes);

        let removed = plan.target_cookies.iter().zip(&outcomes).filter(|(_, ok)| **ok).map(|(c, _)| c);
        if let Err(e) = self.unpin_all(removed) {
            log::error!("failed to update pinned cookies after bulk delete: {e}");
        }

        log::info!("bulk delete finished: {} succeeded, {} failed", report.succeeded, report.failed);
        self.refetch_cookies().await?;
        Ok(report)
    }

    pub fn last_snapshot(&self) -> Option<DeleteSnapshot> {
        load_snapshot(self.persistence.as_ref(), &self.config.snapshot_key)
    }

    /// Re-creates the cookies of the last delete snapshot. The snapshot is kept.
    pub async fn restore_last_snapshot(&self) -> Result<RestoreReport, EngineError> {
        if !self.read(PanelState::is_cookie_scope)? {
            return Err(EngineError::NotCookieScope);
        }
        let snapshot = self.last_snapshot().ok_or(EngineError::NoSnapshot)?;
        let plan = build_restore_operations(&snapshot, clock::now_millis());

        let outcomes = join_all(plan.operations.iter().map(|d| self.set_cookie(d))).await;
        let batch = BatchReport::tally(&outcomes);
        let report = RestoreReport { restored: batch.succeeded, failed: batch.failed, skipped: plan.skipped_count };

        log::info!(
            "restore finished: {} restored, {} failed, {} skipped",
            report.restored,
            report.failed,
            report.skipped
        );
        self.refetch_cookies().await?;
        Ok(report)
    }

    /// Imports an untrusted cookie array. Invalid entries and entries without a derivable URL
    /// count as failures.
    pub async fn import_cookies(&self, payload: &Value) -> Result<BatchReport, EngineError> {
        let plan = create_cookie_import_plan(payload, clock::now_millis())?;

        let outcomes = join_all(plan.valid_entries.into_iter().map(|cookie| async move {
            match CookieDescriptor::from_cookie(cookie) {
                Ok(descriptor) => self.set_cookie(&descriptor).await,
                Err(e) => {
                    log::warn!("skipping imported cookie: {e}");
                    false
                }
            }
        }))
        .await;

        let mut report = BatchReport::tally(&outcomes);
        report.failed += plan.invalid_count;

        log::info!("cookie import finished: {} succeeded, {} failed", report.succeeded, report.failed);
        self.refetch_cookies().await?;
        Ok(report)
    }

    /// The cookies currently shown, as an export file.
    pub fn export_cookies(&self) -> Result<String, EngineError> {
        let cookies = self.read(PanelState::filtered_cookies)?;
        Ok(export_cookies_json(&cookies)?)
    }

    /// Imports entries into the area of the current scope, whatever area the payload names.
    pub async fn import_storage(&self, payload: &Value) -> Result<BatchReport, EngineError> {
        let (tab, area) = self.storage_target()?;
        let entries = parse_import_payload(payload)?;
        if let Some(hint) = import_area_hint(payload).filter(|hint| *hint != area) {
            log::info!("payload targets {hint}, importing into {area}");
        }

        self.bridge.ensure_ready(tab).await?;
        let outcomes = join_all(entries.iter().map(|entry| async move {
            match self.bridge.set(tab, area, &entry.key, &entry.value).await {
                Ok(_) => true,
                Err(e) => {
                    log::error!("error importing storage entry {}: {e}", entry.key);
                    false
                }
            }
        }))
        .await;

        let report = BatchReport::tally(&outcomes);
        log::info!("storage import finished: {} succeeded, {} failed", report.succeeded, report.failed);
        self.refetch_storage().await?;
        Ok(report)
    }

    pub fn export_storage(&self) -> Result<StorageExportPayload, EngineError> {
        self.read(|s| {
            let area = s.scope.storage_area().ok_or(EngineError::StorageUnavailable)?;
            let origin = s.storage_origin.clone().or_else(|| s.domain.origin()).unwrap_or_default();
            Ok(create_export_payload(&s.filtered_storage_entries(), area, &origin))
        })?
    }

    /// Creates or renames-and-updates one entry in the current storage area.
    pub async fn save_storage_entry(
        &self,
        original_key: Option<&str>,
        key: &str,
        value: &Value,
    ) -> Result<StorageMutationInput, EngineError> {
        let (tab, area) = self.storage_target()?;
        let input = normalize_mutation_input(original_key, key, value)?;

        self.bridge.ensure_ready(tab).await?;
        for operation in plan_mutation(&input) {
            match operation {
                StorageMutation::Remove { key } => self.bridge.remove(tab, area, &key).await?,
                StorageMutation::Set { key, value } => self.bridge.set(tab, area, &key, &value).await?,
            };
        }

        self.refetch_storage().await?;
        Ok(input)
    }

    pub async fn delete_storage_entry(&self, key: &str) -> Result<(), EngineError> {
        let (tab, area) = self.storage_target()?;
        self.bridge.ensure_ready(tab).await?;
        self.bridge.remove(tab, area, key).await?;
        self.refetch_storage().await
    }

    fn profiles(&self) -> ProfileStore<'_> {
        ProfileStore::new(self.persistence.as_ref(), &self.config.profiles_key)
    }

    /// Saved profiles, most recently updated first.
    pub fn list_profiles(&self) -> Vec<ProfileRecord> {
        self.profiles().load_sorted()
    }

    pub fn find_profile_by_name(&self, name: &str) -> Option<ProfileRecord> {
        self.profiles().find_by_name(name)
    }

    fn profile(&self, id: &str) -> Result<ProfileRecord, EngineError> {
        self.profiles().find_by_id(id).ok_or_else(|| EngineError::ProfileNotFound(id.to_string()))
    }

    /// The fetched cookies plus both storage areas of the active tab. Storage that cannot be
    /// reached is captured as empty.
    pub async fn collect_profile_state(&self) -> Result<ProfileState, EngineError> {
        let (cookies, tab) = self.read(|s| (s.cookies.to_vec(), s.tab_id.filter(|_| s.domain.is_editable())))?;
        let mut state = ProfileState { cookies, ..Default::default() };

        let Some(tab) = tab else {
            return Ok(state);
        };
        match self.load_both_areas(tab).await {
            Ok((local, session)) => {
                state.local_storage_entries = local;
                state.session_storage_entries = session;
            }
            Err(e) => log::warn!("storage state unavailable for profile capture: {e}"),
        }
        Ok(state)
    }

    async fn load_both_areas(&self, tab: TabId) -> Result<(Vec<StorageEntry>, Vec<StorageEntry>), BridgeError> {
        self.bridge.ensure_ready(tab).await?;
        let (local, session) = try_join(
            self.bridge.get_all(tab, StorageScope::Local),
            self.bridge.get_all(tab, StorageScope::Session),
        )
        .await?;
        Ok((normalize_storage_entries(&local), normalize_storage_entries(&session)))
    }

    fn upsert_profile(&self, record: ProfileRecord) -> Result<ProfileRecord, EngineError> {
        let id = record.id.clone();
        self.profiles()
            .upsert(record)
            .map_err(EngineError::Persistence)?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(EngineError::Internal)
    }

    /// Captures live state under `name`. A profile with the same name (any case) is updated
    /// in place; overwrite confirmation is up to the caller.
    pub async fn save_profile(&self, name: &str) -> Result<ProfileRecord, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::NameRequired.into());
        }

        let existing = self.find_profile_by_name(name);
        let state = self.collect_profile_state().await?;
        let record = create_profile_record(ProfileInput {
            id: existing.as_ref().map(|p| p.id.clone()),
            name: name.to_string(),
            created_at: existing.map(|p| p.created_at),
            updated_at: None,
            cookies: state.cookies,
            local_storage_entries: state.local_storage_entries,
            session_storage_entries: state.session_storage_entries,
        })?;

        let saved = self.upsert_profile(record)?;
        log::info!("profile \"{}\" saved", saved.name);
        Ok(saved)
    }

    /// Stored profile against live state: "added" is live-only.
    pub async fn compare_profile(&self, id: &str) -> Result<ProfileDiff, EngineError> {
        let stored = self.profile(id)?;
        let live = self.collect_profile_state().await?;
        Ok(diff(&stored.state(), &live))
    }

    pub fn export_profile(&self, id: &str) -> Result<ProfileExportPayload, EngineError> {
        Ok(export_payload(&self.profile(id)?))
    }

    /// Imports a v2 or legacy payload. A profile with the same name is overwritten, keeping its
    /// id and creation time.
    pub fn import_profile(&self, payload: &Value) -> Result<ProfileImport, EngineError> {
        let mut imported = import_payload(payload)?;
        if let Some(existing) = self.find_profile_by_name(&imported.profile.name) {
            imported.profile.id = existing.id;
            imported.profile.created_at = existing.created_at;
        }

        imported.profile = self.upsert_profile(imported.profile)?;
        match imported.migrated_from_version {
            Some(v) => log::info!("profile \"{}\" imported (migrated from v{v})", imported.profile.name),
            None => log::info!("profile \"{}\" imported", imported.profile.name),
        }
        Ok(imported)
    }

    pub fn delete_profile(&self, id: &str) -> Result<(), EngineError> {
        self.profile(id)?;
        self.profiles().remove(id).map_err(EngineError::Persistence)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::bridge::{Manifest, TransportError};
    use crate::cookies::DefaultCookieJar;
    use crate::host::LocalHost;
    use crate::storage::InMemoryStorageArea;

    struct Fixture {
        panel: Panel,
        host: Arc<LocalHost>,
        jar: Arc<DefaultCookieJar>,
        persistence: Arc<InMemoryStorageArea>,
        tab: TabId,
    }

    fn fast_config() -> EngineConfig {
        EngineConfig::builder().bridge_retry_delay(Duration::from_millis(1)).build().unwrap()
    }

    async fn fixture(url: &str, cookies: Vec<Cookie>) -> Fixture {
        let host = Arc::new(LocalHost::new());
        let tab = host.open_tab(url);
        let jar = Arc::new(DefaultCookieJar::with_cookies(cookies));
        let persistence = Arc::new(InMemoryStorageArea::new());
        let panel = Panel::new(fast_config(), host.clone(), jar.clone(), host.clone(), persistence.clone());
        panel.refresh().await.unwrap();
        Fixture { panel, host, jar, persistence, tab }
    }

    fn site_cookies() -> Vec<Cookie> {
        vec![
            Cookie::new("sid", "1", "example.com"),
            Cookie::new("theme", "dark", "example.com").with_expiration(9_999_999_999.0),
            Cookie::new("ad", "x", "ads.net"),
        ]
    }

    #[tokio::test]
    async fn refresh_resolves_domain_and_loads_cookies() {
        let f = fixture("https://example.com/home", site_cookies()).await;
        let state = f.panel.state().unwrap();

        assert_eq!(state.domain.domain, "example.com");
        assert_eq!(state.tab_id, Some(f.tab));
        assert_eq!(state.cookies.len(), 3);
        assert_eq!(state.filtered_cookies().len(), 2);
    }

    #[tokio::test]
    async fn stale_generation_is_discarded() {
        let f = fixture("https://example.com/", vec![]).await;
        let stale = f.panel.state().unwrap().generation;
        let current = f.panel.refresh().await.unwrap();
        assert!(current > stale);

        f.jar
            .set(&CookieDescriptor::from_cookie(Cookie::new("late", "1", "example.com")).unwrap())
            .await
            .unwrap();

        f.panel.fetch_cookies(stale).await.unwrap();
        assert!(f.panel.state().unwrap().cookies.is_empty());

        f.panel.fetch_cookies(current).await.unwrap();
        assert_eq!(f.panel.state().unwrap().cookies.len(), 1);
    }

    #[tokio::test]
    async fn storage_scope_installs_bridge_and_loads_entries() {
        let f = fixture("https://example.com/", vec![]).await;
        f.host.page_storage(f.tab).await.unwrap().local.set_item("token", "abc").unwrap();

        f.panel.set_scope(Scope::LocalStorage).unwrap();
        f.panel.refresh().await.unwrap();

        let state = f.panel.state().unwrap();
        assert_eq!(state.storage_load_error, None);
        assert_eq!(state.storage_origin.as_deref(), Some("https://example.com"));
        assert_eq!(*state.storage_entries, vec![StorageEntry::new("token", "abc")]);
    }

    #[tokio::test]
    async fn pinned_storage_entries_persist_and_lead_the_view() {
        let f = fixture("https://example.com/", vec![]).await;
        let local = f.host.page_storage(f.tab).await.unwrap().local;
        local.set_item("a", "1").unwrap();
        local.set_item("b", "2").unwrap();

        let b = StorageEntry::new("b", "2");
        assert!(matches!(f.panel.toggle_storage_pin(&b), Err(EngineError::StorageUnavailable)));

        f.panel.set_scope(Scope::LocalStorage).unwrap();
        f.panel.refresh().await.unwrap();
        assert!(f.panel.toggle_storage_pin(&b).unwrap());

        let keys: Vec<_> = f.panel.state().unwrap().filtered_storage_entries().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["b", "a"]);

        let saved = PinnedCookies::load(f.persistence.as_ref(), &f.panel.config().pinned_storage_key);
        assert!(saved.contains_key("localStorage:https://example.com:b"));

        assert!(!f.panel.toggle_storage_pin(&b).unwrap());
    }

    #[tokio::test]
    async fn storage_is_unavailable_on_browser_pages() {
        let f = fixture("chrome://settings", vec![]).await;
        f.panel.set_scope(Scope::SessionStorage).unwrap();
        f.panel.refresh().await.unwrap();

        let state = f.panel.state().unwrap();
        assert_eq!(state.storage_load_error.as_deref(), Some("Storage is unavailable for this page."));
        assert!(matches!(
            f.panel.save_storage_entry(None, "k", &json!("v")).await,
            Err(EngineError::StorageUnavailable)
        ));
    }

    #[tokio::test]
    async fn storage_edits_need_an_active_tab() {
        let f = fixture("https://example.com/", vec![]).await;
        f.host.close_tab(f.tab);
        f.panel.set_scope(Scope::LocalStorage).unwrap();
        f.panel.refresh().await.unwrap();

        assert_eq!(f.panel.state().unwrap().tab_id, None);
        assert!(matches!(
            f.panel.save_storage_entry(None, "k", &json!("v")).await,
            Err(EngineError::NoActiveTab)
        ));
        assert!(matches!(f.panel.delete_storage_entry("k").await, Err(EngineError::NoActiveTab)));
    }

    /// A page that never answers: every message fails as if no listener existed.
    #[derive(Default)]
    struct DeafTransport {
        sent: AtomicUsize,
    }

    #[async_trait]
    impl BridgeTransport for DeafTransport {
        async fn send_message(&self, _target: TabId, _message: Value) -> Result<Value, TransportError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::no_listener("Receiving end does not exist."))
        }

        async fn inject_script(&self, _target: TabId, _path: &str) -> Result<(), TransportError> {
            Ok(())
        }

        fn manifest(&self) -> Option<Manifest> {
            None
        }
    }

    #[tokio::test]
    async fn transient_failures_retry_then_report_initializing() {
        let host = Arc::new(LocalHost::new());
        host.open_tab("https://example.com/");
        let transport = Arc::new(DeafTransport::default());
        let panel = Panel::new(
            fast_config(),
            host.clone(),
            Arc::new(DefaultCookieJar::new()),
            transport.clone(),
            Arc::new(InMemoryStorageArea::new()),
        );

        panel.set_scope(Scope::LocalStorage).unwrap();
        panel.refresh().await.unwrap();

        let state = panel.state().unwrap();
        assert_eq!(state.storage_load_error.as_deref(), Some(STORAGE_INITIALIZING));
        // three attempts, each a ping plus a ping after injection
        assert_eq!(transport.sent.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn bulk_delete_snapshots_and_restore_brings_cookies_back() {
        let f = fixture("https://example.com/", site_cookies()).await;
        let pinned = f.panel.state().unwrap().cookies[0].clone();
        assert!(f.panel.toggle_pin(&pinned).unwrap());

        let plan = f.panel.plan_bulk_delete(BulkDeleteType::Filtered).unwrap();
        assert_eq!(plan.target_count, 2);

        let err = f.panel.execute_bulk_delete(&plan, "DELETE 3").await.unwrap_err();
        assert_eq!(err.to_string(), "Type \"DELETE 2\" to confirm deletion.");

        let report = f.panel.execute_bulk_delete(&plan, " DELETE 2 ").await.unwrap();
        assert_eq!(report, BatchReport { succeeded: 2, failed: 0 });

        let state = f.panel.state().unwrap();
        assert_eq!(state.cookies.len(), 1);
        assert!(state.pinned.is_empty());
        assert!(PinnedCookies::load(f.persistence.as_ref(), &f.panel.config().pinned_key).is_empty());

        let snapshot = f.panel.last_snapshot().unwrap();
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.reason, "filtered");

        let restored = f.panel.restore_last_snapshot().await.unwrap();
        assert_eq!(restored, RestoreReport { restored: 2, failed: 0, skipped: 0 });
        assert_eq!(f.panel.state().unwrap().cookies.len(), 3);
        assert!(f.panel.last_snapshot().is_some());
    }

    #[tokio::test]
    async fn restore_without_snapshot_fails() {
        let f = fixture("https://example.com/", vec![]).await;
        assert!(matches!(f.panel.restore_last_snapshot().await, Err(EngineError::NoSnapshot)));

        f.panel.set_scope(Scope::LocalStorage).unwrap();
        assert!(matches!(f.panel.restore_last_snapshot().await, Err(EngineError::NotCookieScope)));
    }

    #[tokio::test]
    async fn import_cookies_counts_invalid_and_unroutable_entries() {
        let f = fixture("https://example.com/", vec![]).await;
        let payload = json!([
            { "name": "a", "value": "1", "domain": "example.com" },
            { "name": "b", "value": "2", "domain": "http://bad" },
            { "name": "c" },
        ]);

        let report = f.panel.import_cookies(&payload).await.unwrap();
        assert_eq!(report, BatchReport { succeeded: 1, failed: 2 });
        assert_eq!(f.panel.state().unwrap().cookies.len(), 1);

        let err = f.panel.import_cookies(&json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Input must be a JSON array.");
    }

    #[tokio::test]
    async fn single_cookie_save_and_delete() {
        let f = fixture("https://example.com/", vec![]).await;

        let saved = f.panel.save_cookie(Cookie::new(" sid ", "1", "")).await.unwrap();
        assert_eq!(saved.name, "sid");
        assert_eq!(saved.domain, ".example.com");

        let past = Cookie::new("old", "1", "example.com").with_expiration(1.0);
        assert!(matches!(f.panel.save_cookie(past).await, Err(EngineError::ExpirationInPast)));

        f.panel.delete_cookie(&saved).await.unwrap();
        assert!(f.panel.state().unwrap().cookies.is_empty());
        assert!(matches!(f.panel.delete_cookie(&saved).await, Err(EngineError::CookieNotRemoved)));
    }

    #[tokio::test]
    async fn storage_entries_import_rename_and_delete() {
        let f = fixture("https://example.com/", vec![]).await;
        f.panel.set_scope(Scope::SessionStorage).unwrap();
        f.panel.refresh().await.unwrap();

        let payload = json!({
            "storageArea": "localStorage",
            "entries": [{ "key": "a", "value": "1" }, { "key": "b", "value": 2 }],
        });
        let report = f.panel.import_storage(&payload).await.unwrap();
        assert_eq!(report, BatchReport { succeeded: 2, failed: 0 });

        f.panel.save_storage_entry(Some("a"), "renamed", &json!("1")).await.unwrap();
        f.panel.delete_storage_entry("b").await.unwrap();

        let state = f.panel.state().unwrap();
        assert_eq!(*state.storage_entries, vec![StorageEntry::new("renamed", "1")]);

        let session = f.host.page_storage(f.tab).await.unwrap().session;
        assert_eq!(session.get_item("renamed").as_deref(), Some("1"));
        let local = f.host.page_storage(f.tab).await.unwrap().local;
        assert!(local.is_empty());

        let export = f.panel.export_storage().unwrap();
        assert_eq!(export.storage_area, StorageScope::Session);
        assert_eq!(export.origin, "https://example.com");
    }

    #[tokio::test]
    async fn profiles_save_compare_export_import() {
        let f = fixture("https://example.com/", site_cookies()).await;
        f.host.page_storage(f.tab).await.unwrap().local.set_item("token", "abc").unwrap();

        let saved = f.panel.save_profile(" Work ").await.unwrap();
        assert_eq!(saved.name, "Work");
        assert_eq!(saved.cookies.len(), 3);
        assert_eq!(saved.local_storage_entries, vec![StorageEntry::new("token", "abc")]);

        assert!(f.panel.compare_profile(&saved.id).await.unwrap().is_empty());

        f.host.page_storage(f.tab).await.unwrap().local.set_item("token", "xyz").unwrap();
        let drift = f.panel.compare_profile(&saved.id).await.unwrap();
        assert_eq!(drift.local_storage.changed[0].live_value, "xyz");
        assert_eq!(drift.summary.changed, 1);

        // saving under the same name updates in place
        let again = f.panel.save_profile("work").await.unwrap();
        assert_eq!(again.id, saved.id);
        assert_eq!(again.created_at, saved.created_at);
        assert_eq!(f.panel.list_profiles().len(), 1);

        let exported = serde_json::to_value(f.panel.export_profile(&saved.id).unwrap()).unwrap();
        let mut renamed = exported.clone();
        renamed["profile"]["id"] = json!("profile_0_zzzzzz");
        let imported = f.panel.import_profile(&renamed).unwrap();
        assert_eq!(imported.migrated_from_version, None);
        assert_eq!(imported.profile.id, saved.id);
        assert_eq!(f.panel.list_profiles().len(), 1);

        f.panel.delete_profile(&saved.id).unwrap();
        assert!(f.panel.list_profiles().is_empty());
        assert!(matches!(f.panel.delete_profile(&saved.id), Err(EngineError::ProfileNotFound(_))));
    }
}
