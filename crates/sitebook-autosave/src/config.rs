//! Session configuration.
//!
//! All fields default, so an empty TOML document is a valid config:
//!
//! ```toml
//! debounce_ms = 400
//! batch_window_ms = 100
//! saved_display_ms = 1500
//! request_timeout_ms = 30000   # 0 disables the timeout
//! flush_poll_attempts = 20
//! flush_poll_interval_ms = 50
//! event_capacity = 256
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::AutosaveError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutosaveConfig {
    pub debounce_ms: u64,
    pub batch_window_ms: u64,
    pub saved_display_ms: u64,
    pub request_timeout_ms: u64,
    pub flush_poll_attempts: u32,
    pub flush_poll_interval_ms: u64,
    pub event_capacity: usize,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            batch_window_ms: DEFAULT_BATCH_WINDOW.as_millis() as u64,
            saved_display_ms: DEFAULT_SAVED_DISPLAY.as_millis() as u64,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT.as_millis() as u64,
            flush_poll_attempts: DEFAULT_FLUSH_POLL_ATTEMPTS,
            flush_poll_interval_ms: DEFAULT_FLUSH_POLL_INTERVAL.as_millis() as u64,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl AutosaveConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, AutosaveError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AutosaveError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Reject values that would make the engine misbehave.
    pub fn validate(&self) -> Result<(), AutosaveError> {
        if self.event_capacity == 0 {
            return Err(AutosaveError::InvalidConfig(
                "event_capacity must be at least 1".into(),
            ));
        }
        if self.flush_poll_attempts == 0 {
            return Err(AutosaveError::InvalidConfig(
                "flush_poll_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn with_debounce(mut self, d: Duration) -> Self {
        self.debounce_ms = d.as_millis() as u64;
        self
    }

    pub fn with_batch_window(mut self, d: Duration) -> Self {
        self.batch_window_ms = d.as_millis() as u64;
        self
    }

    pub fn with_saved_display(mut self, d: Duration) -> Self {
        self.saved_display_ms = d.as_millis() as u64;
        self
    }

    /// `None` disables the request timeout.
    pub fn with_request_timeout(mut self, d: Option<Duration>) -> Self {
        self.request_timeout_ms = d.map(|d| d.as_millis() as u64).unwrap_or(0);
        self
    }

    pub fn with_flush_poll(mut self, attempts: u32, interval: Duration) -> Self {
        self.flush_poll_attempts = attempts;
        self.flush_poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    pub fn saved_display(&self) -> Duration {
        Duration::from_millis(self.saved_display_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    pub fn flush_poll_interval(&self) -> Duration {
        Duration::from_millis(self.flush_poll_interval_ms)
    }
}
