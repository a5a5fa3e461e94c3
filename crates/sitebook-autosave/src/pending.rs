//! Unsent edits and the version tokens they will be sent against.
//!
//! The pending buffer is the recovery mechanism: a flush takes everything
//! out, and whatever the store did not acknowledge goes back in. Nothing
//! leaves the buffer except through [`PendingEdits::take_all`] (followed by
//! an ack or a restore) or an explicit [`PendingEdits::discard`].

use std::collections::HashMap;

use sitebook_types::{ItemUpdate, RowId, VersionToken};

#[derive(Debug, Default)]
pub struct PendingEdits {
    /// Merged, not-yet-sent update per row.
    pending: HashMap<RowId, ItemUpdate>,
    /// Last server-confirmed version per row.
    last_known: HashMap<RowId, VersionToken>,
}

impl PendingEdits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an edit into the row's pending update.
    pub fn queue(&mut self, update: ItemUpdate) {
        match self.pending.get_mut(&update.id) {
            Some(existing) => existing.merge(update),
            None => {
                self.pending.insert(update.id.clone(), update);
            }
        }
    }

    /// Snapshot and clear the buffer, sorted by row id.
    ///
    /// Edits queued afterwards start a fresh buffer.
    pub fn take_all(&mut self) -> Vec<ItemUpdate> {
        let mut batch: Vec<ItemUpdate> = self.pending.drain().map(|(_, u)| u).collect();
        batch.sort_by(|a, b| a.id.cmp(&b.id));
        batch
    }

    /// Put an unacknowledged edit back.
    ///
    /// If the row was edited again while the request was in flight, those
    /// newer values are layered on top of the restored ones.
    pub fn restore(&mut self, mut update: ItemUpdate) {
        if let Some(newer) = self.pending.remove(&update.id) {
            update.merge(newer);
        }
        self.pending.insert(update.id.clone(), update);
    }

    /// Drop a row's pending edit, returning it.
    pub fn discard(&mut self, id: &RowId) -> Option<ItemUpdate> {
        self.pending.remove(id)
    }

    pub fn get(&self, id: &RowId) -> Option<&ItemUpdate> {
        self.pending.get(id)
    }

    pub fn contains(&self, id: &RowId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending updates sorted by row id, without draining.
    pub fn updates(&self) -> Vec<ItemUpdate> {
        let mut updates: Vec<ItemUpdate> = self.pending.values().cloned().collect();
        updates.sort_by(|a, b| a.id.cmp(&b.id));
        updates
    }

    // ── Version tokens ──────────────────────────────────────────────────

    /// The `expected_updated_at` to send with this row's next save.
    pub fn expected_version(&self, id: &RowId) -> Option<VersionToken> {
        self.last_known.get(id).cloned()
    }

    pub fn record_version(&mut self, id: &RowId, token: VersionToken) {
        self.last_known.insert(id.clone(), token);
    }

    /// Forget the row's version so its next save is unconditional.
    pub fn forget_version(&mut self, id: &RowId) {
        self.last_known.remove(id);
    }
}
