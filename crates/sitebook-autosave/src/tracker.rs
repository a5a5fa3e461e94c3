//! Per-row save state.
//!
//! Rows appear lazily on first write and stay until the session ends. Once
//! the session's liveness token is cancelled every write is dropped, so a
//! late timer or request callback cannot touch state after teardown.

use std::collections::{BTreeMap, HashMap};

use sitebook_types::{RowId, RowSaveState, RowStatePatch};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct RowStateTracker {
    rows: HashMap<RowId, RowSaveState>,
    liveness: CancellationToken,
}

impl RowStateTracker {
    pub fn new(liveness: CancellationToken) -> Self {
        Self {
            rows: HashMap::new(),
            liveness,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.liveness.is_cancelled()
    }

    /// Current state, or the default `idle` state for unknown rows.
    pub fn get(&self, id: &RowId) -> RowSaveState {
        self.rows.get(id).cloned().unwrap_or_default()
    }

    /// Merge `patch` into the row's state, creating it if needed.
    ///
    /// Returns the resulting state for the caller to publish, or `None` if
    /// the session is torn down and nothing was written.
    pub fn set(&mut self, id: &RowId, patch: RowStatePatch) -> Option<RowSaveState> {
        if !self.is_live() {
            return None;
        }
        let state = self.rows.entry(id.clone()).or_default();
        state.apply(patch);
        Some(state.clone())
    }

    /// All known rows, sorted by id.
    pub fn snapshot(&self) -> BTreeMap<RowId, RowSaveState> {
        self.rows
            .iter()
            .map(|(id, state)| (id.clone(), state.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
