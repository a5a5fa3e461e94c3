//! Autosave timing defaults.
//!
//! Every value here can be overridden through [`AutosaveConfig`](crate::AutosaveConfig).

use std::time::Duration;

/// Quiet period after the last edit to a row before it is ready to send.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

/// Shared window that collects ready rows into one request.
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(100);

/// How long a row shows `saved` before dropping back to `idle`.
pub const DEFAULT_SAVED_DISPLAY: Duration = Duration::from_millis(1500);

/// Upper bound on one batch request. A hung request would otherwise leave
/// its rows in `saving` forever.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Polls made by `flush_pending_saves` while waiting for an in-flight flush.
pub const DEFAULT_FLUSH_POLL_ATTEMPTS: u32 = 20;

/// Sleep between those polls.
pub const DEFAULT_FLUSH_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Broadcast capacity for [`AutosaveEvent`](crate::AutosaveEvent) subscribers.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;
