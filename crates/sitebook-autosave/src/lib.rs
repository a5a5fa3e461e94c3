//! Row-level autosave for sitebook estimate editing.
//!
//! Collects many concurrent per-row edits into periodic batched writes,
//! detects lost updates through optimistic version tokens, and never drops an
//! edit because a save failed: anything the store did not acknowledge stays
//! in the pending buffer until it is resent or the user resolves it.
//!
//! ```no_run
//! # async fn demo(store: impl sitebook_autosave::BatchUpsert) {
//! use sitebook_autosave::{AutosaveConfig, spawn_session};
//! use sitebook_types::ItemUpdate;
//!
//! let session = spawn_session(store, AutosaveConfig::default());
//! session.queue_update(ItemUpdate::new("row-1").with_quantity(2.0));
//!
//! // Leaving the page: push out whatever is still waiting.
//! session.flush_pending_saves().await;
//! session.shutdown();
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod flush;
pub mod pending;
pub mod session;
pub mod tracker;
pub mod upsert;

pub use config::AutosaveConfig;
pub use error::{AutosaveError, UpsertError};
pub use events::AutosaveEvent;
pub use flush::{FlushReport, NO_RESPONSE, RowOutcome};
pub use session::{AutosaveHandle, CONFLICT_MESSAGE, spawn_session};
pub use upsert::BatchUpsert;
