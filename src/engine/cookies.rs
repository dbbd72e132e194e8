//! Cookies: the [`Cookie`] record, the host [`CookieJar`] capability, pinning and
//! import/export.

use thiserror::Error;

mod cookie;
mod cookie_jar;
pub(crate) mod lenient;
mod pinned;
pub mod transfer;

pub use cookie::{
    derive_cookie_url, group_cookies_by_domain, parse_date_to_unix_seconds, sort_cookies_by_pinned, Cookie,
    CookieComparable, CookieDescriptor, SameSite,
};
pub use cookie_jar::{CookieJar, DefaultCookieJar, RemovalDetails};
pub use pinned::PinnedCookies;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CookieError {
    #[error("Cannot derive URL without cookie domain.")]
    MissingDomain,

    #[error("Invalid domain format for URL derivation: {0}")]
    InvalidDomain(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Input must be a JSON array.")]
    NotAnArray,
}
