//! Domain context for the active tab.
//!
//! The host resolves the active tab to a URL; this module turns that into a
//! domain label. Failures never propagate as errors: they yield one of the
//! sentinel labels below, which the rest of the engine treats as a
//! non-editable domain.

use url::Url;

use crate::tab::TabInfo;

pub const LABEL_NO_TAB: &str = "N/A";
pub const LABEL_EMPTY_TAB: &str = "Empty Tab";
pub const LABEL_INVALID_URL: &str = "Invalid URL";
pub const LABEL_LOCAL_FILE: &str = "Local File";

const NON_EDITABLE_DOMAIN_LABELS: [&str; 6] = [
    "chrome",
    "about",
    LABEL_INVALID_URL,
    LABEL_EMPTY_TAB,
    LABEL_NO_TAB,
    LABEL_LOCAL_FILE,
];

/// Domain label plus the raw tab URL (empty when unknown).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainContext {
    pub domain: String,
    pub tab_url: String,
}

impl DomainContext {
    pub fn unavailable() -> Self {
        Self {
            domain: LABEL_NO_TAB.to_string(),
            tab_url: String::new(),
        }
    }

    pub fn is_editable(&self) -> bool {
        can_edit_domain(&self.domain)
    }

    /// Origin of the tab URL (`scheme://host[:port]`), if it has one.
    pub fn origin(&self) -> Option<String> {
        let url = Url::parse(&self.tab_url).ok()?;
        let origin = url.origin();
        origin.is_tuple().then(|| origin.ascii_serialization())
    }
}

pub fn parse_domain_context(tab: Option<&TabInfo>) -> DomainContext {
    let Some(tab) = tab else {
        return DomainContext::unavailable();
    };

    match &tab.url {
        None => DomainContext {
            domain: LABEL_EMPTY_TAB.to_string(),
            tab_url: String::new(),
        },
        Some(url) => DomainContext {
            domain: parse_domain_label(url),
            tab_url: url.clone(),
        },
    }
}

pub fn parse_domain_label(tab_url: &str) -> String {
    match Url::parse(tab_url) {
        Ok(url) => {
            let scheme = url.scheme();
            if scheme == "chrome" || scheme == "about" {
                return scheme.to_string();
            }
            match url.host_str() {
                Some(host) if !host.is_empty() => host.to_string(),
                _ => LABEL_LOCAL_FILE.to_string(),
            }
        }
        Err(_) if tab_url.starts_with("file:") => LABEL_LOCAL_FILE.to_string(),
        Err(_) => LABEL_INVALID_URL.to_string(),
    }
}

pub fn can_edit_domain(domain: &str) -> bool {
    !domain.is_empty() && !NON_EDITABLE_DOMAIN_LABELS.contains(&domain)
}

/// Cookie domains are suggested with a leading dot so they cover subdomains.
pub fn suggest_domain_for_cookie(domain: &str) -> String {
    if domain.starts_with('.') {
        domain.to_string()
    } else {
        format!(".{domain}")
    }
}

/// True when `current_domain` is the cookie's domain or one of its subdomains.
pub fn is_cookie_in_current_domain(cookie_domain: &str, current_domain: &str) -> bool {
    if cookie_domain.is_empty() || !can_edit_domain(current_domain) {
        return false;
    }

    let host = normalize_domain(current_domain);
    let cookie = normalize_domain(cookie_domain);
    host == cookie || host.ends_with(&format!(".{cookie}"))
}

fn normalize_domain(value: &str) -> String {
    let trimmed = value.trim();
    trimmed.strip_prefix('.').unwrap_or(trimmed).to_lowercase()
}
