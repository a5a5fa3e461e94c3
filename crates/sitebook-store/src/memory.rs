//! In-memory [`BatchUpsert`] with fault injection.
//!
//! Behaves like a real store by default. Faults are armed per test:
//!
//! - [`fail_next_call`](MemoryItemStore::fail_next_call): next call fails as a whole
//! - [`reject_row`](MemoryItemStore::reject_row): a row keeps failing validation
//! - [`omit_row`](MemoryItemStore::omit_row): a row is left out of the response
//! - [`bump_version`](MemoryItemStore::bump_version): someone else wrote the row
//! - [`stall`](MemoryItemStore::stall): next call never returns

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use sitebook_autosave::{BatchUpsert, UpsertError};
use sitebook_types::{BatchResult, ItemUpdate, RowId, VersionToken, now_millis};
use tracing::debug;

use crate::item::{StoredItem, apply_update, next_version};

#[derive(Default)]
struct MemoryState {
    items: HashMap<RowId, StoredItem>,
    requests: Vec<Vec<ItemUpdate>>,
    fail_next: Option<String>,
    stall_next: bool,
    rejected: HashMap<RowId, String>,
    omitted: HashSet<RowId>,
}

#[derive(Default)]
pub struct MemoryItemStore {
    state: Mutex<MemoryState>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row, replacing any existing one.
    pub fn insert(&self, item: StoredItem) {
        self.state.lock().items.insert(item.id.clone(), item);
    }

    pub fn get(&self, id: &RowId) -> Option<StoredItem> {
        self.state.lock().items.get(id).cloned()
    }

    /// All rows ordered by `sort_order`, then id.
    pub fn items(&self) -> Vec<StoredItem> {
        let mut items: Vec<_> = self.state.lock().items.values().cloned().collect();
        items.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id)));
        items
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> Vec<Vec<ItemUpdate>> {
        self.state.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    pub fn fail_next_call(&self, message: impl Into<String>) {
        self.state.lock().fail_next = Some(message.into());
    }

    pub fn reject_row(&self, id: impl Into<RowId>, message: impl Into<String>) {
        self.state.lock().rejected.insert(id.into(), message.into());
    }

    pub fn omit_row(&self, id: impl Into<RowId>) {
        self.state.lock().omitted.insert(id.into());
    }

    pub fn stall(&self) {
        self.state.lock().stall_next = true;
    }

    /// Disarm every fault.
    pub fn clear_faults(&self) {
        let mut state = self.state.lock();
        state.fail_next = None;
        state.stall_next = false;
        state.rejected.clear();
        state.omitted.clear();
    }

    /// Simulate another user's write: advance the row's version without
    /// touching its values. Returns the new version.
    pub fn bump_version(&self, id: &RowId) -> Option<VersionToken> {
        let mut state = self.state.lock();
        let item = state.items.get_mut(id)?;
        item.updated_at = next_version(Some(&item.updated_at), now_millis());
        Some(item.updated_at.clone())
    }

    fn apply_batch(&self, items: &[ItemUpdate]) -> Result<Vec<BatchResult>, UpsertError> {
        let mut state = self.state.lock();
        if let Some(message) = state.fail_next.take() {
            return Err(UpsertError::Unavailable(message));
        }

        let now = now_millis();
        let mut results = Vec::with_capacity(items.len());
        for update in items {
            if state.omitted.contains(&update.id) {
                continue;
            }
            if let Some(message) = state.rejected.get(&update.id) {
                results.push(BatchResult::rejected(update.id.clone(), message.clone()));
                continue;
            }
            let current = state.items.get(&update.id).cloned();
            match apply_update(current, update, now) {
                Ok(item) => {
                    results.push(BatchResult::saved(item.id.clone(), item.updated_at.clone()));
                    state.items.insert(item.id.clone(), item);
                }
                Err(refusal) => results.push(refusal.into_result(&update.id)),
            }
        }
        Ok(results)
    }
}

#[async_trait]
impl BatchUpsert for MemoryItemStore {
    async fn batch_upsert(&self, items: Vec<ItemUpdate>) -> Result<Vec<BatchResult>, UpsertError> {
        let stall = {
            let mut state = self.state.lock();
            state.requests.push(items.clone());
            std::mem::take(&mut state.stall_next)
        };
        if stall {
            debug!(rows = items.len(), "Stalling batch");
            return std::future::pending().await;
        }
        self.apply_batch(&items)
    }
}
