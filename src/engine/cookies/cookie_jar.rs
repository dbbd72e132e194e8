//! Cookie jar abstraction and a simple in-memory implementation.
//!
//! A **cookie jar** is the host's cookie capability: list every cookie, create one from a
//! [`CookieDescriptor`], remove one by url/name/store. Callers must treat both an `Err` and a
//! `None` return as a failed operation; the host reports some failures one way and some the
//! other.
//!
//! [`DefaultCookieJar`] keeps cookies **in memory only**, keyed by
//! `(store, domain, path, name)`. It checks that the descriptor's url host domain-matches the
//! cookie domain and nothing more; there is no eviction or expiry enforcement.

use std::sync::RwLock;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cookies::cookie::DEFAULT_STORE_ID;
use crate::cookies::{Cookie, CookieDescriptor};

/// What the host reports after removing a cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalDetails {
    pub url: String,
    pub name: String,
    pub store_id: String,
}

#[async_trait]
pub trait CookieJar: Send + Sync {
    /// Every cookie across every store.
    async fn list(&self) -> Result<Vec<Cookie>>;

    /// Creates or overwrites a cookie. `None` means the host refused it.
    async fn set(&self, descriptor: &CookieDescriptor) -> Result<Option<Cookie>>;

    /// Removes the cookie named `name` that would be sent to `url`. `None` means nothing
    /// was removed.
    async fn remove(&self, url: &str, name: &str, store_id: Option<&str>) -> Result<Option<RemovalDetails>>;
}

#[derive(Debug, Default)]
pub struct DefaultCookieJar {
    cookies: RwLock<Vec<Cookie>>,
}

impl DefaultCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a jar holding `cookies`. Store ids default to `"0"`.
    pub fn with_cookies(cookies: impl IntoIterator<Item = Cookie>) -> Self {
        let cookies = cookies.into_iter().map(with_default_store).collect();
        Self { cookies: RwLock::new(cookies) }
    }
}

fn with_default_store(mut cookie: Cookie) -> Cookie {
    if cookie.store_id.is_none() {
        cookie.store_id = Some(DEFAULT_STORE_ID.to_string());
    }
    cookie
}

fn same_slot(a: &Cookie, b: &Cookie) -> bool {
    a.store_id == b.store_id && a.domain == b.domain && a.path == b.path && a.name == b.name
}

fn domain_matches(host: &str, cookie_domain: &str) -> bool {
    let domain = cookie_domain.trim_start_matches('.').to_ascii_lowercase();
    let host = host.to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}

#[async_trait]
impl CookieJar for DefaultCookieJar {
    async fn list(&self) -> Result<Vec<Cookie>> {
        let cookies = self.cookies.read().map_err(|_| anyhow!("cookie jar lock poisoned"))?;
        Ok(cookies.clone())
    }

    async fn set(&self, descriptor: &CookieDescriptor) -> Result<Option<Cookie>> {
        let url = Url::parse(&descriptor.url).with_context(|| format!("invalid cookie url {}", descriptor.url))?;
        let host = url.host_str().unwrap_or_default();
        if !domain_matches(host, &descriptor.cookie.domain) {
            log::debug!("refusing cookie {} for {host}", descriptor.cookie.storage_key());
            return Ok(None);
        }

        let cookie = with_default_store(descriptor.cookie.clone());
        let mut cookies = self.cookies.write().map_err(|_| anyhow!("cookie jar lock poisoned"))?;
        match cookies.iter_mut().find(|c| same_slot(c, &cookie)) {
            Some(existing) => *existing = cookie.clone(),
            None => cookies.push(cookie.clone()),
        }
        Ok(Some(cookie))
    }

    async fn remove(&self, url: &str, name: &str, store_id: Option<&str>) -> Result<Option<RemovalDetails>> {
        let parsed = Url::parse(url).with_context(|| format!("invalid cookie url {url}"))?;
        let host = parsed.host_str().unwrap_or_default();
        let path = parsed.path();
        let store = store_id.unwrap_or(DEFAULT_STORE_ID);

        let mut cookies = self.cookies.write().map_err(|_| anyhow!("cookie jar lock poisoned"))?;
        let found = cookies.iter().position(|c| {
            c.name == name
                && c.store_id.as_deref() == Some(store)
                && domain_matches(host, &c.domain)
                && path.starts_with(&c.path)
        });

        Ok(found.map(|idx| {
            cookies.remove(idx);
            RemovalDetails { url: url.to_string(), name: name.to_string(), store_id: store.to_string() }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(cookie: Cookie) -> CookieDescriptor {
        CookieDescriptor::from_cookie(cookie).unwrap()
    }

    #[tokio::test]
    async fn set_overwrites_same_slot() {
        let jar = DefaultCookieJar::new();
        jar.set(&descriptor(Cookie::new("sid", "1", ".example.com"))).await.unwrap();
        let stored = jar.set(&descriptor(Cookie::new("sid", "2", ".example.com"))).await.unwrap();
        assert_eq!(stored.unwrap().store_id.as_deref(), Some("0"));

        let cookies = jar.list().await.unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].value, "2");

        jar.set(&descriptor(Cookie::new("sid", "3", ".example.com").with_path("/app"))).await.unwrap();
        assert_eq!(jar.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn set_refuses_foreign_domain() {
        let jar = DefaultCookieJar::new();
        let mut d = descriptor(Cookie::new("sid", "1", "example.com"));
        d.url = "https://other.org/".into();
        assert!(jar.set(&d).await.unwrap().is_none());
        assert!(jar.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_matches_domain_and_path() {
        let jar = DefaultCookieJar::with_cookies([
            Cookie::new("sid", "1", ".example.com"),
            Cookie::new("sid", "2", "other.org"),
        ]);

        let removed = jar.remove("http://www.example.com/", "sid", None).await.unwrap();
        assert_eq!(removed.unwrap().store_id, "0");
        assert_eq!(jar.list().await.unwrap().len(), 1);

        assert!(jar.remove("http://example.com/", "sid", None).await.unwrap().is_none());
        assert!(jar.remove("not a url", "sid", None).await.is_err());
    }
}
