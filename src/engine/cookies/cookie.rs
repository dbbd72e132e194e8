//! The [`Cookie`] record and the pure helpers built on it.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::clock;
use crate::cookies::lenient;
use crate::cookies::CookieError;

pub(crate) const DEFAULT_PATH: &str = "/";
pub(crate) const DEFAULT_STORE_ID: &str = "0";
const UNKNOWN_DOMAIN: &str = "Unknown Domain";

/// SameSite policy, using the host's wire names.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameSite {
    NoRestriction,
    #[default]
    Lax,
    Strict,
    Unspecified,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::NoRestriction => "no_restriction",
            SameSite::Lax => "lax",
            SameSite::Strict => "strict",
            SameSite::Unspecified => "unspecified",
        }
    }
}

impl Display for SameSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SameSite {
    type Err = ();

    /// Accepts the host names plus the `Set-Cookie` attribute spelling (`None`), any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no_restriction" | "none" => Ok(SameSite::NoRestriction),
            "lax" => Ok(SameSite::Lax),
            "strict" => Ok(SameSite::Strict),
            "unspecified" => Ok(SameSite::Unspecified),
            _ => Err(()),
        }
    }
}

/// A cookie as listed by the host and as recorded in snapshots, profiles and exports.
///
/// Deserialization is lenient about everything except `name`, `value` and `domain`, which
/// must be strings: a missing or empty path becomes `/`, flags use truthiness, an absent or
/// empty SameSite becomes `lax`, and non-string store ids or non-numeric expirations are
/// dropped. A cookie without an expiration is a session cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path", deserialize_with = "lenient::path")]
    pub path: String,
    #[serde(default, deserialize_with = "lenient::truthy")]
    pub secure: bool,
    #[serde(default, deserialize_with = "lenient::truthy")]
    pub http_only: bool,
    #[serde(default, deserialize_with = "lenient::same_site")]
    pub same_site: SameSite,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub store_id: Option<String>,
    /// Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_number")]
    pub expiration_date: Option<f64>,
}

fn default_path() -> String {
    DEFAULT_PATH.to_string()
}

/// The fields compared when deciding whether two cookies with the same identity differ.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieComparable<'a> {
    pub value: &'a str,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub expiration_date: Option<f64>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: default_path(),
            secure: false,
            http_only: false,
            same_site: SameSite::default(),
            store_id: None,
            expiration_date: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_store_id(mut self, store_id: impl Into<String>) -> Self {
        self.store_id = Some(store_id.into());
        self
    }

    pub fn with_expiration(mut self, unix_seconds: f64) -> Self {
        self.expiration_date = Some(unix_seconds);
        self
    }

    pub fn is_session(&self) -> bool {
        self.expiration_date.is_none()
    }

    /// `domain:name`, the key used for pinning and snapshot matching.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.domain, self.name)
    }

    /// `domain:name:path:storeId`, the key used when diffing profiles.
    pub fn profile_identity(&self) -> String {
        let path = if self.path.is_empty() { DEFAULT_PATH } else { &self.path };
        let store = self.store_id.as_deref().filter(|s| !s.is_empty()).unwrap_or(DEFAULT_STORE_ID);
        format!("{}:{}:{path}:{store}", self.domain, self.name)
    }

    pub fn comparable(&self) -> CookieComparable<'_> {
        CookieComparable {
            value: &self.value,
            secure: self.secure,
            http_only: self.http_only,
            same_site: self.same_site,
            expiration_date: self.expiration_date,
        }
    }

    /// Drops an expiration that is already in the past, turning the cookie into a session
    /// cookie.
    pub fn without_past_expiration(mut self, now_ms: i64) -> Self {
        if let Some(exp) = self.expiration_date {
            if exp * 1000.0 <= now_ms as f64 {
                self.expiration_date = None;
            }
        }
        self
    }

    /// Reads one untrusted cookie record; `None` if it is not an object with string
    /// `name`, `value` and `domain`.
    pub fn deserialize_record(value: &serde_json::Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }

    /// The URL the host needs in order to set or remove this cookie.
    pub fn url(&self) -> Result<String, CookieError> {
        derive_cookie_url(&self.domain, &self.path, self.secure)
    }
}

/// Everything the host needs to create a cookie.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieDescriptor {
    pub url: String,
    #[serde(flatten)]
    pub cookie: Cookie,
}

impl CookieDescriptor {
    pub fn from_cookie(cookie: Cookie) -> Result<Self, CookieError> {
        let url = cookie.url()?;
        Ok(Self { url, cookie })
    }
}

/// Builds `scheme://domain/path` for a cookie: https when secure, leading dot stripped from the
/// domain, path forced to start with `/`.
pub fn derive_cookie_url(domain: &str, path: &str, secure: bool) -> Result<String, CookieError> {
    if domain.is_empty() {
        return Err(CookieError::MissingDomain);
    }

    let scheme = if secure { "https" } else { "http" };
    let host = domain.strip_prefix('.').unwrap_or(domain);
    if host.contains("://") {
        return Err(CookieError::InvalidDomain(domain.to_string()));
    }

    let url = if path.starts_with('/') {
        format!("{scheme}://{host}{path}")
    } else {
        format!("{scheme}://{host}/{path}")
    };

    match Url::parse(&url) {
        Ok(parsed) if parsed.host_str().is_some() => Ok(url),
        _ => Err(CookieError::InvalidDomain(domain.to_string())),
    }
}

/// Pinned cookies first, then by domain, then by name.
pub fn sort_cookies_by_pinned(cookies: &[Cookie], is_pinned: impl Fn(&Cookie) -> bool) -> Vec<Cookie> {
    let mut sorted = cookies.to_vec();
    sorted.sort_by(|a, b| {
        is_pinned(b)
            .cmp(&is_pinned(a))
            .then_with(|| a.domain.cmp(&b.domain))
            .then_with(|| a.name.cmp(&b.name))
    });
    sorted
}

pub fn group_cookies_by_domain(cookies: &[Cookie]) -> BTreeMap<String, Vec<Cookie>> {
    let mut groups: BTreeMap<String, Vec<Cookie>> = BTreeMap::new();
    for cookie in cookies {
        let domain = if cookie.domain.is_empty() { UNKNOWN_DOMAIN } else { &cookie.domain };
        groups.entry(domain.to_string()).or_default().push(cookie.clone());
    }
    groups
}

/// Parses a user-entered expiration. An empty input means "session cookie" (`Ok(None)`).
pub fn parse_date_to_unix_seconds(input: &str) -> Result<Option<i64>, CookieError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    clock::parse_unix_seconds(input)
        .map(Some)
        .ok_or_else(|| CookieError::InvalidDate(input.to_string()))
}
