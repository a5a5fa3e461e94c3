//! Per-row verdicts returned by a batched upsert.

use serde::{Deserialize, Serialize};

use crate::ids::{RowId, VersionToken};

/// Error code a store uses when `expected_updated_at` no longer matches.
pub const CONFLICT: &str = "CONFLICT";

/// One row's result from a batch upsert, in the store's wire shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub id: RowId,
    pub success: bool,
    /// New version on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<VersionToken>,
    /// `"CONFLICT"` or a human-readable message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The row's current version, reported alongside a conflict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_updated_at: Option<VersionToken>,
}

/// A [`BatchResult`] sorted into the three cases the engine reacts to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowVerdict {
    Saved { updated_at: Option<VersionToken> },
    Conflict { server_updated_at: Option<VersionToken> },
    Rejected { message: String },
}

impl BatchResult {
    pub fn saved(id: impl Into<RowId>, updated_at: VersionToken) -> Self {
        Self {
            id: id.into(),
            success: true,
            updated_at: Some(updated_at),
            error: None,
            server_updated_at: None,
        }
    }

    pub fn conflict(id: impl Into<RowId>, server_updated_at: VersionToken) -> Self {
        Self {
            id: id.into(),
            success: false,
            updated_at: None,
            error: Some(CONFLICT.to_string()),
            server_updated_at: Some(server_updated_at),
        }
    }

    pub fn rejected(id: impl Into<RowId>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            updated_at: None,
            error: Some(message.into()),
            server_updated_at: None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        !self.success && self.error.as_deref() == Some(CONFLICT)
    }

    /// Classify this result. A failure with no message still counts as a
    /// rejection so it is never mistaken for success.
    pub fn verdict(&self) -> RowVerdict {
        if self.success {
            RowVerdict::Saved {
                updated_at: self.updated_at.clone(),
            }
        } else if self.is_conflict() {
            RowVerdict::Conflict {
                server_updated_at: self.server_updated_at.clone(),
            }
        } else {
            RowVerdict::Rejected {
                message: self
                    .error
                    .clone()
                    .unwrap_or_else(|| "save rejected".to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdicts() {
        let ok = BatchResult::saved("r1", VersionToken::from("t1"));
        assert_eq!(
            ok.verdict(),
            RowVerdict::Saved { updated_at: Some(VersionToken::from("t1")) }
        );

        let conflict = BatchResult::conflict("r1", VersionToken::from("t2"));
        assert!(conflict.is_conflict());
        assert_eq!(
            conflict.verdict(),
            RowVerdict::Conflict { server_updated_at: Some(VersionToken::from("t2")) }
        );

        let bad = BatchResult::rejected("r1", "quantity must be positive");
        assert_eq!(
            bad.verdict(),
            RowVerdict::Rejected { message: "quantity must be positive".into() }
        );
    }

    #[test]
    fn test_failure_without_message_is_rejection() {
        let result: BatchResult =
            serde_json::from_str(r#"{"id":"r1","success":false}"#).unwrap();
        assert!(matches!(result.verdict(), RowVerdict::Rejected { .. }));
    }

    #[test]
    fn test_wire_shape_of_conflict() {
        let json: BatchResult = serde_json::from_str(
            r#"{"id":"X","success":false,"error":"CONFLICT","server_updated_at":"T"}"#,
        )
        .unwrap();
        assert_eq!(json, BatchResult::conflict("X", VersionToken::from("T")));
    }
}
