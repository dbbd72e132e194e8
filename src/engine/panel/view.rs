use crate::cookies::Cookie;
use crate::domain::is_cookie_in_current_domain;
use crate::panel::ViewTab;

/// Cookies shown by the active list.
///
/// The current-domain view keeps cookies sent to the current domain and searches names only;
/// the all-domains view searches name, value and domain. Search is trimmed and
/// case-insensitive.
pub fn filter_cookies_for_active_view(
    cookies: &[Cookie],
    view: ViewTab,
    current_domain: &str,
    search_term: &str,
) -> Vec<Cookie> {
    let needle = search_term.trim().to_lowercase();
    let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);

    match view {
        ViewTab::Current => cookies
            .iter()
            .filter(|c| is_cookie_in_current_domain(&c.domain, current_domain))
            .filter(|c| needle.is_empty() || contains(&c.name))
            .cloned()
            .collect(),
        ViewTab::All if needle.is_empty() => cookies.to_vec(),
        ViewTab::All => cookies
            .iter()
            .filter(|c| contains(&c.name) || contains(&c.value) || contains(&c.domain))
            .cloned()
            .collect(),
    }
}

/// Always at least one page, even for an empty list.
pub fn total_pages(item_count: usize, per_page: usize) -> usize {
    item_count.div_ceil(per_page.max(1)).max(1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageSlice<T> {
    /// 1-based, clamped into `1..=total_pages`.
    pub current_page: usize,
    pub total_pages: usize,
    pub items: Vec<T>,
}

pub fn page_slice<T: Clone>(items: &[T], page: usize, per_page: usize) -> PageSlice<T> {
    let per_page = per_page.max(1);
    let total_pages = total_pages(items.len(), per_page);
    let current_page = page.clamp(1, total_pages);

    let start = (current_page - 1) * per_page;
    let end = (start + per_page).min(items.len());

    PageSlice {
        current_page,
        total_pages,
        items: items[start..end].to_vec(),
    }
}
