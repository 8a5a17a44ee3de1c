//! Storage error type shared by every record module.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The store rejected or could not execute a statement.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A row did not carry the expected column or type.
    #[error("column {column}: {message}")]
    Column { column: String, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl StorageError {
    /// IPC error code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Sqlite(_) | StorageError::Column { .. } => "db_query_failed",
            StorageError::NotFound(_) => "not_found",
            StorageError::Conflict(_) => "conflict",
            StorageError::InvalidInput(_) => "bad_params",
        }
    }
}
