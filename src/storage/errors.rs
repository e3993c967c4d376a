//! Storage layer error types
//!
//! All errors that can occur during storage operations are defined here.
//! Both backends report through the same enum so the console never has to
//! know which engine it is talking to.

use std::path::Path;

use thiserror::Error;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// the durable medium can't be reached (missing session, I/O fault)
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// error from the SQLite driver that isn't a connection fault
    #[error("sql error: {0}")]
    Sql(rusqlite::Error),

    /// a stored discriminator or table names a class the registry doesn't know
    #[error("unknown class in storage: {0}")]
    UnknownClass(String),

    /// data integrity check failed
    #[error("corrupted data at {location}: {reason}")]
    CorruptedData { location: String, reason: String },
}

impl StorageError {
    /// check if this error means the backend itself can't be reached
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_) | StorageError::Io(_))
    }

    /// check if this error is about the shape of stored data
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            StorageError::Serialization(_)
                | StorageError::UnknownClass(_)
                | StorageError::CorruptedData { .. }
        )
    }

    pub(crate) fn corrupted(location: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::CorruptedData {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io_at(path: &Path, err: std::io::Error) -> Self {
        StorageError::Unavailable(format!("{}: {}", path.display(), err))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref code, _)
                if matches!(
                    code.code,
                    rusqlite::ErrorCode::CannotOpen
                        | rusqlite::ErrorCode::DatabaseBusy
                        | rusqlite::ErrorCode::DatabaseLocked
                        | rusqlite::ErrorCode::SystemIoFailure
                        | rusqlite::ErrorCode::NotADatabase
                        | rusqlite::ErrorCode::ReadOnly
                ) =>
            {
                StorageError::Unavailable(err.to_string())
            }
            other => StorageError::Sql(other),
        }
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
