use std::sync::Arc;

use crate::cookies::{sort_cookies_by_pinned, Cookie, PinnedCookies};
use crate::domain::DomainContext;
use crate::panel::view::{filter_cookies_for_active_view, page_slice, PageSlice};
use std::collections::BTreeMap;

use crate::storage::view::{
    filter_storage_entries, group_storage_entries_by_namespace, sort_storage_entries_by_pinned, storage_pin_key,
};
use crate::storage::{StorageEntry, StorageScope};
use crate::tab::TabId;

/// What the panel is listing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Scope {
    #[default]
    Cookies,
    LocalStorage,
    SessionStorage,
}

impl Scope {
    /// The page storage area behind a storage scope.
    pub fn storage_area(&self) -> Option<StorageScope> {
        match self {
            Scope::Cookies => None,
            Scope::LocalStorage => Some(StorageScope::Local),
            Scope::SessionStorage => Some(StorageScope::Session),
        }
    }
}

/// Cookie list tab.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ViewTab {
    #[default]
    Current,
    All,
}

/// Everything the panel renders from. Fetched collections are immutable snapshots replaced
/// wholesale on each fetch.
#[derive(Debug, Clone)]
pub struct PanelState {
    pub scope: Scope,
    pub view: ViewTab,
    pub search_term: String,
    pub domain: DomainContext,
    pub tab_id: Option<TabId>,
    /// Bumped by every active-tab refresh.
    pub generation: u64,
    pub cookies: Arc<Vec<Cookie>>,
    pub storage_entries: Arc<Vec<StorageEntry>>,
    pub storage_origin: Option<String>,
    pub storage_load_error: Option<String>,
    pub pinned: PinnedCookies,
    /// Pinned storage entries, keyed by [`storage_pin_key`].
    pub pinned_storage: PinnedCookies,
    /// 1-based.
    pub page: usize,
    pub page_size: usize,
}

impl PanelState {
    pub fn new(pinned: PinnedCookies, pinned_storage: PinnedCookies, page_size: usize) -> Self {
        Self {
            scope: Scope::default(),
            view: ViewTab::default(),
            search_term: String::new(),
            domain: DomainContext::unavailable(),
            tab_id: None,
            generation: 0,
            cookies: Arc::new(Vec::new()),
            storage_entries: Arc::new(Vec::new()),
            storage_origin: None,
            storage_load_error: None,
            pinned,
            pinned_storage,
            page: 1,
            page_size,
        }
    }

    pub fn is_cookie_scope(&self) -> bool {
        self.scope == Scope::Cookies
    }

    /// A storage scope on a tab whose domain is editable.
    pub fn can_mutate_storage(&self) -> bool {
        !self.is_cookie_scope() && self.tab_id.is_some() && self.domain.is_editable()
    }

    /// The active view after search, pinned first.
    pub fn filtered_cookies(&self) -> Vec<Cookie> {
        let filtered = filter_cookies_for_active_view(&self.cookies, self.view, &self.domain.domain, &self.search_term);
        sort_cookies_by_pinned(&filtered, |c| self.pinned.is_pinned(c))
    }

    pub fn cookie_page(&self) -> PageSlice<Cookie> {
        page_slice(&self.filtered_cookies(), self.page, self.page_size)
    }

    /// The origin storage pins are recorded under.
    pub fn storage_pin_origin(&self) -> String {
        self.storage_origin
            .clone()
            .or_else(|| self.domain.origin())
            .or_else(|| Some(self.domain.domain.clone()).filter(|d| !d.is_empty()))
            .unwrap_or_else(|| "unknown-origin".to_string())
    }

    /// `None` in cookie scope.
    pub fn storage_pin_key(&self, entry: &StorageEntry) -> Option<String> {
        let area = self.scope.storage_area()?;
        Some(storage_pin_key(area, &self.storage_pin_origin(), &entry.key))
    }

    pub fn is_storage_entry_pinned(&self, entry: &StorageEntry) -> bool {
        self.storage_pin_key(entry)
            .is_some_and(|key| self.pinned_storage.contains_key(&key))
    }

    /// Entries matching the search, pinned first, then by key.
    pub fn filtered_storage_entries(&self) -> Vec<StorageEntry> {
        let filtered = filter_storage_entries(&self.storage_entries, &self.search_term);
        sort_storage_entries_by_pinned(&filtered, |e| self.is_storage_entry_pinned(e))
    }

    pub fn storage_groups(&self) -> BTreeMap<String, Vec<StorageEntry>> {
        group_storage_entries_by_namespace(&self.filtered_storage_entries())
    }

    pub fn storage_page(&self) -> PageSlice<StorageEntry> {
        page_slice(&self.filtered_storage_entries(), self.page, self.page_size)
    }
}
