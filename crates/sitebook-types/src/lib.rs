//! Shared row and save-state types for sitebook.
//!
//! This is a leaf crate: no internal sitebook dependencies. The autosave
//! engine, the reference stores and host UIs all speak these types.
//!
//! |-------------------|-----------------------------------------------|
//! | Type              | Purpose                                       |
//! |-------------------|-----------------------------------------------|
//! | [`RowId`]         | Which estimate line item                      |
//! | [`VersionToken`]  | Server `updated_at`, for optimistic locking   |
//! | [`ItemUpdate`]    | Field-level delta for one row                 |
//! | [`BatchResult`]   | Store's per-row verdict for one batch         |
//! | [`SaveStatus`]    | idle/dirty/saving/saved/error/conflict        |
//! | [`RowSaveState`]  | Status plus diagnostics for one row           |
//! |-------------------|-----------------------------------------------|

pub mod batch;
pub mod ids;
pub mod item;
pub mod state;

pub use batch::{BatchResult, CONFLICT, RowVerdict};
pub use ids::{RowId, VersionToken};
pub use item::ItemUpdate;
pub use state::{RowSaveState, RowStatePatch, SaveStatus};

/// Current time as Unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
