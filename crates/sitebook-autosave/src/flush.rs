//! Reconciling one batch response against the snapshot that was sent.
//!
//! Pure functions, no timers or I/O: the session hands in the snapshot and
//! whatever came back, and gets one [`RowOutcome`] per snapshot row. Every
//! row that did not succeed carries its original edit so the caller can put
//! it back in the pending buffer.

use std::collections::HashMap;

use sitebook_types::{BatchResult, ItemUpdate, RowId, RowVerdict, VersionToken};
use tracing::warn;

use crate::pending::PendingEdits;

/// Error text for a row the store left out of its response.
pub const NO_RESPONSE: &str = "no response for this row";

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Saved { updated_at: Option<VersionToken> },
    Conflict { server_updated_at: Option<VersionToken>, edit: ItemUpdate },
    Failed { message: String, edit: ItemUpdate },
}

impl RowOutcome {
    pub fn is_failure(&self) -> bool {
        !matches!(self, RowOutcome::Saved { .. })
    }
}

/// Per-row outcomes of one flush, in snapshot order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlushReport {
    pub outcomes: Vec<(RowId, RowOutcome)>,
}

impl FlushReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn saved_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| !o.is_failure()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failure()).count()
    }
}

/// Attach each row's last known version to a copy of the snapshot.
pub fn prepare_request(snapshot: &[ItemUpdate], edits: &PendingEdits) -> Vec<ItemUpdate> {
    snapshot
        .iter()
        .map(|update| {
            let mut item = update.clone();
            item.expected_updated_at = edits.expected_version(&update.id);
            item
        })
        .collect()
}

/// Match the store's results to the snapshot.
///
/// Results for ids that were not sent are ignored; duplicate results keep
/// the first. Snapshot rows without a result fail with [`NO_RESPONSE`].
pub fn reconcile(snapshot: Vec<ItemUpdate>, results: &[BatchResult]) -> FlushReport {
    let mut by_id: HashMap<&RowId, &BatchResult> = HashMap::with_capacity(results.len());
    for result in results {
        if by_id.contains_key(&result.id) {
            warn!("Duplicate batch result for row {}, keeping the first", result.id);
            continue;
        }
        by_id.insert(&result.id, result);
    }

    let mut outcomes = Vec::with_capacity(snapshot.len());
    for edit in snapshot {
        let id = edit.id.clone();
        let outcome = match by_id.remove(&id).map(BatchResult::verdict) {
            Some(RowVerdict::Saved { updated_at }) => RowOutcome::Saved { updated_at },
            Some(RowVerdict::Conflict { server_updated_at }) => {
                RowOutcome::Conflict { server_updated_at, edit }
            }
            Some(RowVerdict::Rejected { message }) => RowOutcome::Failed { message, edit },
            None => RowOutcome::Failed {
                message: NO_RESPONSE.to_string(),
                edit,
            },
        };
        outcomes.push((id, outcome));
    }

    for stray in by_id.keys() {
        warn!("Batch result for row {} that was not in the request", stray);
    }

    FlushReport { outcomes }
}

/// Every row of a request that failed as a whole.
pub fn fail_all(snapshot: Vec<ItemUpdate>, message: &str) -> FlushReport {
    let outcomes = snapshot
        .into_iter()
        .map(|edit| {
            (
                edit.id.clone(),
                RowOutcome::Failed {
                    message: message.to_string(),
                    edit,
                },
            )
        })
        .collect();
    FlushReport { outcomes }
}

/// The single user-facing notice for a flush with failures.
pub fn failure_notice(failed: usize, total: usize) -> String {
    let rows = if failed == 1 { "row" } else { "rows" };
    format!(
        "{failed} {rows} of {total} could not be saved. Your edits are kept locally; \
         edit again or retry to resend them."
    )
}
