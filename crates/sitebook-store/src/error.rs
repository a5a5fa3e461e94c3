use sitebook_autosave::UpsertError;
use sitebook_types::RowId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("labels encoding error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("row {0} not found")]
    NotFound(RowId),
}

/// A store error that escapes a whole batch means the store is unusable.
impl From<StoreError> for UpsertError {
    fn from(err: StoreError) -> Self {
        UpsertError::Unavailable(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
