//! The side panel: explicit view state plus the controller that drives the host
//! capabilities, the bridge, snapshots and profiles on its behalf.
//!
//! Derived views (filtered, paginated) are pure functions of the latest fetched snapshot and
//! the current scope. Every async fetch carries the refresh generation it was started under
//! and is discarded if a newer refresh has begun by the time it completes.

mod controller;
mod state;
mod view;

pub use controller::{BatchReport, Panel, RestoreReport, STORAGE_INITIALIZING};
pub use state::{PanelState, Scope, ViewTab};
pub use view::{filter_cookies_for_active_view, page_slice, total_pages, PageSlice};
