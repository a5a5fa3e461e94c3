//! Typed identifiers for editable rows and server version tokens.
//!
//! Both wrap the string form the backing store hands out. Row ids are usually
//! UUIDv7 text, but anything the store accepts is a valid id; the engine
//! never parses them. Version tokens are opaque to the engine, which only
//! compares them. Stores may mint them from milliseconds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of one editable row (an estimate line item).
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

/// Server-issued version of a row, compared for optimistic concurrency.
///
/// This is the row's `updated_at` as the store reports it.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_string_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// The underlying string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// First 8 characters, for log lines only.
            pub fn short(&self) -> &str {
                let end = self
                    .0
                    .char_indices()
                    .nth(8)
                    .map(|(i, _)| i)
                    .unwrap_or(self.0.len());
                &self.0[..end]
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $T {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $T {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $T {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.0)
            }
        }
    };
}

impl_string_id!(RowId, "RowId");
impl_string_id!(VersionToken, "VersionToken");

impl RowId {
    /// Mint a fresh time-ordered row id (UUIDv7, hyphenated).
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }
}

impl Default for RowId {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionToken {
    /// Token for a millisecond `updated_at` value.
    pub fn from_millis(ms: u64) -> Self {
        Self(ms.to_string())
    }

    /// Parse back to milliseconds, if the store issued a numeric token.
    pub fn as_millis(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_row_ids_are_unique() {
        let a = RowId::new();
        let b = RowId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_handles_short_ids() {
        assert_eq!(RowId::from("r1").short(), "r1");
        let id = RowId::new();
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_debug_names_the_type() {
        let id = RowId::from("r1");
        assert_eq!(format!("{id:?}"), "RowId(r1)");
        assert_eq!(format!("{id}"), "r1");
    }

    #[test]
    fn test_version_token_millis() {
        let v = VersionToken::from_millis(1_700_000_000_123);
        assert_eq!(v.as_str(), "1700000000123");
        assert_eq!(v.as_millis(), Some(1_700_000_000_123));
        assert_eq!(VersionToken::from("t1").as_millis(), None);
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = RowId::from("r1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"r1\"");
        let back: RowId = serde_json::from_str("\"r1\"").unwrap();
        assert_eq!(back, id);
    }
}
