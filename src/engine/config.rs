//! Engine configuration.
//!
//! `EngineConfig` holds the tunables shared by the bridge client, the snapshot
//! engine, the profile store and the panel controller. Sensible defaults are
//! provided via [`Default`] and a fluent, validating [`EngineConfig::builder()`].
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use crumble::config::EngineConfig;
//! let cfg = EngineConfig::default();
//! assert_eq!(cfg.bridge_retry.max_retries, 2);
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use std::time::Duration;
//! use crumble::config::EngineConfig;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = EngineConfig::builder()
//!     .bridge_retries(3)
//!     .bridge_retry_delay(Duration::from_millis(100))
//!     .page_size(50)
//!     .build()?; // returns Result<EngineConfig, ConfigError>
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `bridge_retry`: bounded retry policy for transient bridge failures (default: 2 × 220ms).
//! - `responder_script_marker`: substring identifying the responder script in the manifest.
//! - `default_responder_script`: path injected when the manifest has no match.
//! - `snapshot_key`: persistence key for the single delete snapshot slot.
//! - `profiles_key`: persistence key for the profile list.
//! - `pinned_key`: persistence key for the pinned cookie map.
//! - `pinned_storage_key`: persistence key for the pinned storage entry map.
//! - `page_size`: items per page for paginated views (default: 25).

use std::fmt;
use std::time::Duration;

pub const DEFAULT_SNAPSHOT_KEY: &str = "cookieSnatcher.lastDeleteSnapshot";
pub const DEFAULT_PROFILES_KEY: &str = "cookieSnatcher.profiles.v1";
pub const DEFAULT_PINNED_KEY: &str = "pinnedCookies";
pub const DEFAULT_PINNED_STORAGE_KEY: &str = "pinnedStorageEntries";
pub const DEFAULT_RESPONDER_SCRIPT: &str = "content-script.js";
pub const DEFAULT_RESPONDER_MARKER: &str = "content-script";

/// Bounded, fixed-delay retry policy for transient bridge errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. The total number of attempts is `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before each retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_millis(220),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub bridge_retry: RetryPolicy,
    pub responder_script_marker: String,
    pub default_responder_script: String,
    pub snapshot_key: String,
    pub profiles_key: String,
    pub pinned_key: String,
    pub pinned_storage_key: String,
    pub page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bridge_retry: RetryPolicy::default(),
            responder_script_marker: DEFAULT_RESPONDER_MARKER.to_string(),
            default_responder_script: DEFAULT_RESPONDER_SCRIPT.to_string(),
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
            profiles_key: DEFAULT_PROFILES_KEY.to_string(),
            pinned_key: DEFAULT_PINNED_KEY.to_string(),
            pinned_storage_key: DEFAULT_PINNED_STORAGE_KEY.to_string(),
            page_size: 25,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    inner: EngineConfig,
}

impl EngineConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut EngineConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn bridge_retries(self, n: u32) -> Self { self.map(|c| c.bridge_retry.max_retries = n) }
    pub fn bridge_retry_delay(self, d: Duration) -> Self { self.map(|c| c.bridge_retry.delay = d) }
    pub fn responder_script_marker<S: Into<String>>(self, m: S) -> Self { self.map(|c| c.responder_script_marker = m.into()) }
    pub fn default_responder_script<S: Into<String>>(self, p: S) -> Self { self.map(|c| c.default_responder_script = p.into()) }
    pub fn snapshot_key<S: Into<String>>(self, k: S) -> Self { self.map(|c| c.snapshot_key = k.into()) }
    pub fn profiles_key<S: Into<String>>(self, k: S) -> Self { self.map(|c| c.profiles_key = k.into()) }
    pub fn pinned_key<S: Into<String>>(self, k: S) -> Self { self.map(|c| c.pinned_key = k.into()) }
    pub fn pinned_storage_key<S: Into<String>>(self, k: S) -> Self { self.map(|c| c.pinned_storage_key = k.into()) }
    pub fn page_size(self, n: usize) -> Self { self.map(|c| c.page_size = n) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut EngineConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroRetryDelay { retries: u32 },
    EmptyKey(&'static str),
    ZeroPageSize,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroRetryDelay { retries } =>
                write!(f, "bridge retry delay must be non-zero when retries ({retries}) are enabled"),
            ConfigError::EmptyKey(which) =>
                write!(f, "{which} must not be empty"),
            ConfigError::ZeroPageSize =>
                write!(f, "page_size must be at least 1"),
        }
    }
}
impl std::error::Error for ConfigError {}

fn validate(c: &EngineConfig) -> Result<(), ConfigError> {
    if c.bridge_retry.max_retries > 0 && c.bridge_retry.delay.is_zero() {
        return Err(ConfigError::ZeroRetryDelay { retries: c.bridge_retry.max_retries });
    }
    let keys = [
        ("responder_script_marker", &c.responder_script_marker),
        ("default_responder_script", &c.default_responder_script),
        ("snapshot_key", &c.snapshot_key),
        ("profiles_key", &c.profiles_key),
        ("pinned_key", &c.pinned_key),
        ("pinned_storage_key", &c.pinned_storage_key),
    ];
    for (name, value) in keys {
        if value.trim().is_empty() {
            return Err(ConfigError::EmptyKey(name));
        }
    }
    if c.page_size == 0 {
        return Err(ConfigError::ZeroPageSize);
    }
    Ok(())
}
