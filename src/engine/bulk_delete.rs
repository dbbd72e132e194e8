//! Bulk-delete planning: which cookies a bulk action would remove, and the typed
//! confirmation that guards it.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cookies::{Cookie, PinnedCookies};

const PREVIEW_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Unsupported bulk delete type.")]
    UnsupportedType(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkDeleteType {
    /// Every cookie in the current filtered view.
    Filtered,
    /// Filtered cookies without an expiration.
    Session,
    /// Filtered cookies that are not pinned.
    #[serde(rename = "nonpinned")]
    NonPinned,
}

impl BulkDeleteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkDeleteType::Filtered => "filtered",
            BulkDeleteType::Session => "session",
            BulkDeleteType::NonPinned => "nonpinned",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            BulkDeleteType::Filtered => "Delete All Filtered Cookies",
            BulkDeleteType::Session => "Delete Filtered Session Cookies",
            BulkDeleteType::NonPinned => "Delete Filtered Non-Pinned Cookies",
        }
    }
}

impl Display for BulkDeleteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BulkDeleteType {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filtered" => Ok(BulkDeleteType::Filtered),
            "session" => Ok(BulkDeleteType::Session),
            "nonpinned" => Ok(BulkDeleteType::NonPinned),
            other => Err(PlanError::UnsupportedType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewItem {
    pub name: String,
    pub domain: String,
    pub is_session: bool,
    pub is_pinned: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkDeletePlan {
    pub kind: BulkDeleteType,
    pub title: &'static str,
    pub total_filtered: usize,
    pub target_count: usize,
    pub session_target_count: usize,
    /// Only non-zero for [`BulkDeleteType::NonPinned`].
    pub pinned_skipped_count: usize,
    pub target_cookies: Vec<Cookie>,
    pub preview: Vec<PreviewItem>,
}

pub fn create_plan(kind: BulkDeleteType, cookies: &[Cookie], pinned: &PinnedCookies) -> BulkDeletePlan {
    let target_cookies: Vec<Cookie> = match kind {
        BulkDeleteType::Filtered => cookies.to_vec(),
        BulkDeleteType::Session => cookies.iter().filter(|c| c.is_session()).cloned().collect(),
        BulkDeleteType::NonPinned => cookies.iter().filter(|c| !pinned.is_pinned(c)).cloned().collect(),
    };

    let preview = target_cookies
        .iter()
        .take(PREVIEW_LIMIT)
        .map(|c| PreviewItem {
            name: c.name.clone(),
            domain: c.domain.clone(),
            is_session: c.is_session(),
            is_pinned: pinned.is_pinned(c),
        })
        .collect();

    let pinned_skipped_count = match kind {
        BulkDeleteType::NonPinned => cookies.iter().filter(|c| pinned.is_pinned(c)).count(),
        _ => 0,
    };

    BulkDeletePlan {
        kind,
        title: kind.title(),
        total_filtered: cookies.len(),
        target_count: target_cookies.len(),
        session_target_count: target_cookies.iter().filter(|c| c.is_session()).count(),
        pinned_skipped_count,
        target_cookies,
        preview,
    }
}

/// The phrase the user must type to confirm `plan`.
pub fn confirmation_phrase(plan: &BulkDeletePlan) -> String {
    format!("DELETE {}", plan.target_count)
}

/// Only `input` is trimmed; `expected` must match exactly.
pub fn is_confirmation_valid(input: &str, expected: &str) -> bool {
    input.trim() == expected
}
