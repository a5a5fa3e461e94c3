//! Events the session pushes to its host.
//!
//! Subscribe via [`AutosaveHandle::subscribe()`](crate::AutosaveHandle::subscribe).
//! Delivery is a tokio broadcast: a subscriber that falls behind sees
//! `RecvError::Lagged` and should re-read state through the accessors.

use sitebook_types::{RowId, RowSaveState};

#[derive(Clone, Debug, PartialEq)]
pub enum AutosaveEvent {
    /// A row's save state changed. Re-render its indicator.
    RowStateChanged { id: RowId, state: RowSaveState },
    /// One notice per flush that had failures.
    FlushFailed {
        failed: usize,
        total: usize,
        message: String,
    },
    /// A flush was reconciled.
    FlushCompleted { saved: usize, failed: usize },
    /// The user accepted the server's version; reload this row.
    RefetchRequested { id: RowId },
}
