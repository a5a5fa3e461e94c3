//! The one backing-store operation the engine depends on.

use std::sync::Arc;

use async_trait::async_trait;
use sitebook_types::{BatchResult, ItemUpdate};

use crate::error::UpsertError;

/// Apply many row updates in one call.
///
/// For every submitted item an implementation must:
///
/// - apply it and answer `success: true` with the new `updated_at` when the
///   item has no `expected_updated_at`, or it matches the stored version;
/// - answer `error: "CONFLICT"` with `server_updated_at` when the expected
///   version is stale;
/// - answer `success: false` with a message for any other per-row failure.
///
/// At most one result per id. Missing results are tolerated and treated as
/// failures. Return `Err` only when the call as a whole failed.
#[async_trait]
pub trait BatchUpsert: Send + Sync + 'static {
    async fn batch_upsert(&self, items: Vec<ItemUpdate>) -> Result<Vec<BatchResult>, UpsertError>;
}

#[async_trait]
impl<T: BatchUpsert + ?Sized> BatchUpsert for Arc<T> {
    async fn batch_upsert(&self, items: Vec<ItemUpdate>) -> Result<Vec<BatchResult>, UpsertError> {
        (**self).batch_upsert(items).await
    }
}
