//! Backing stores for the sitebook autosave engine.
//!
//! Both implement [`sitebook_autosave::BatchUpsert`] with the same per-row
//! rule (see [`item::apply_update`]): a row without `expected_updated_at`
//! is written unconditionally, a matching version is written and bumped,
//! a stale one is answered with `CONFLICT` and the stored version.
//!
//! - [`MemoryItemStore`]: a `HashMap` behind a mutex, with fault injection
//! - [`SqliteItemStore`]: an `estimate_items` table via [`ItemDb`]

pub mod db;
pub mod error;
pub mod item;
pub mod memory;

pub use db::{ItemDb, SqliteItemStore};
pub use error::{StoreError, StoreResult};
pub use item::{Refusal, StoredItem};
pub use memory::MemoryItemStore;
