use crate::bridge::BridgeError;
use crate::bulk_delete::PlanError;
use crate::cookies::CookieError;
use crate::profile::ProfileError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No active tab found.")]
    NoActiveTab,

    #[error("Storage is unavailable for this page.")]
    StorageUnavailable,

    #[error("This action is only available in cookie scope.")]
    NotCookieScope,

    #[error("No delete snapshot found.")]
    NoSnapshot,

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Type \"{0}\" to confirm deletion.")]
    ConfirmationMismatch(String),

    #[error("Cookie name is required.")]
    CookieNameRequired,

    #[error("Expiration date must be in the future.")]
    ExpirationInPast,

    #[error("Failed to set cookie. Check domain/path/flags validity.")]
    CookieRejected,

    #[error("Failed to remove cookie. Maybe it was already deleted?")]
    CookieNotRemoved,

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Cookie(#[from] CookieError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("Host error: {0}")]
    Host(#[source] anyhow::Error),

    #[error("Persistence error: {0}")]
    Persistence(#[source] anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal engine error")]
    Internal,
}
