use std::time::Duration;

/// Errors from the autosave session itself.
///
/// Save failures never show up here; they land in per-row state instead.
#[derive(Debug, thiserror::Error)]
pub enum AutosaveError {
    #[error("autosave session shut down")]
    Shutdown,
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A batch request that failed as a whole, before any per-row result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpsertError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}
