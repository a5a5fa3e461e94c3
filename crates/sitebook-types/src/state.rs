//! Per-row save status as shown to the user.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::VersionToken;

/// Where a row is in its save lifecycle.
///
/// ```text
/// idle ──edit──▶ dirty ──flush──▶ saving ──ok──▶ saved ──(display window)──▶ idle
///                                   │
///                                   ├──CONFLICT──▶ conflict   (until accept/force)
///                                   └──failure───▶ error      (until retry/edit)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum SaveStatus {
    /// Nothing unsaved.
    #[default]
    Idle,
    /// Has edits not yet sent.
    Dirty,
    /// Included in the batch currently in flight.
    Saving,
    /// Acknowledged by the store; reverts to idle shortly.
    Saved,
    /// Last save failed; edit retained locally.
    Error,
    /// Someone else changed the row first; edit retained locally.
    Conflict,
}

impl SaveStatus {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SaveStatus::Idle => "idle",
            SaveStatus::Dirty => "dirty",
            SaveStatus::Saving => "saving",
            SaveStatus::Saved => "saved",
            SaveStatus::Error => "error",
            SaveStatus::Conflict => "conflict",
        }
    }

    /// Statuses that stay put until the user acts.
    pub fn needs_attention(&self) -> bool {
        matches!(self, SaveStatus::Error | SaveStatus::Conflict)
    }
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything the UI needs to render one row's save indicator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSaveState {
    pub status: SaveStatus,
    /// Last failure reason; cleared when the row is sent again.
    pub error: Option<String>,
    /// Unix millis of the last acknowledged save.
    pub last_saved: Option<u64>,
    /// The server's version, set when a save hit a conflict.
    pub server_updated_at: Option<VersionToken>,
}

/// Partial update to a [`RowSaveState`]; `None` fields are left unchanged.
///
/// `error` and `server_updated_at` are doubly optional so a patch can clear
/// them (`Some(None)`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RowStatePatch {
    pub status: Option<SaveStatus>,
    pub error: Option<Option<String>>,
    pub last_saved: Option<u64>,
    pub server_updated_at: Option<Option<VersionToken>>,
}

impl RowStatePatch {
    pub fn status(status: SaveStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_last_saved(mut self, millis: u64) -> Self {
        self.last_saved = Some(millis);
        self
    }

    pub fn with_server_updated_at(mut self, token: Option<VersionToken>) -> Self {
        self.server_updated_at = Some(token);
        self
    }
}

impl RowSaveState {
    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: RowStatePatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(error) = patch.error {
            self.error = error;
        }
        if let Some(last_saved) = patch.last_saved {
            self.last_saved = Some(last_saved);
        }
        if let Some(token) = patch.server_updated_at {
            self.server_updated_at = token;
        }
    }
}
