//! Error types for index operations.

use thiserror::Error;

/// Errors that can occur while reading or writing the catalog.
#[derive(Debug, Error)]
pub enum IndexError {
    /// SQLite failure, including lock contention (see [`IndexError::is_busy`]).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A JSON column could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row holds a value that cannot be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// I/O error while preparing the catalog location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexError {
    /// Whether the failure is lock contention that a retry may resolve.
    pub fn is_busy(&self) -> bool {
        match self {
            Self::Sqlite(err) => matches!(
                err.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }
}

/// Convenience type alias for index operations.
pub type IndexResult<T> = std::result::Result<T, IndexError>;
