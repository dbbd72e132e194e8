//! Profiles: named captures of cookies and both storage areas, the versioned export format
//! and the reconciliation diff against live state.

use thiserror::Error;

mod diff;
mod record;
mod schema;

pub use diff::{diff, ChangedEntry, DiffSummary, ProfileDiff, SetDiff};
pub use record::{
    create_profile_id, create_profile_record, is_profile_record, ProfileInput, ProfileRecord, ProfileState,
    ProfileStore, PROFILE_KIND, PROFILE_VERSION,
};
pub use schema::{
    export_payload, import_payload, ExportedProfile, ExportedState, ExportedStorage, ProfileExportPayload,
    ProfileImport, PROFILE_EXPORT_KIND, PROFILE_EXPORT_VERSION,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("Profile name is required.")]
    NameRequired,

    #[error("Profile import payload must be an object.")]
    NotAnObject,

    #[error("Unsupported profile payload format or version.")]
    Unsupported,

    #[error("Invalid v2 profile payload.")]
    InvalidV2Payload,

    #[error("Invalid v2 profile state.")]
    InvalidV2State,

    #[error("Invalid v2 profile storage state.")]
    InvalidV2Storage,

    #[error("Invalid v1 profile payload.")]
    InvalidV1Payload,
}
