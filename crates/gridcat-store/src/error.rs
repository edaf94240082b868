//! Error types for the gridcat store.

use thiserror::Error;

/// Result type alias for store lifecycle operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised while opening or preparing the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unsupported database url: {0}")]
    UnsupportedUrl(String),

    #[error("failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("schema bootstrap failed: {0}")]
    Schema(String),
}

/// Failure of a single query execution.
///
/// Carries only a summary of the underlying store error, safe to return to
/// a client.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutionError {
    #[error("{0}")]
    Database(String),

    #[error("a value is required for bind parameter '{0}'")]
    MissingParameter(String),

    #[error("cannot decode column '{column}': {message}")]
    Decode { column: String, message: String },
}

impl ExecutionError {
    /// True when the store itself rejected or failed the query (as opposed
    /// to a failure converting its results).
    pub fn is_database(&self) -> bool {
        !matches!(self, ExecutionError::Decode { .. })
    }
}

impl From<sqlx::Error> for ExecutionError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => ExecutionError::Database(db.message().to_string()),
            sqlx::Error::ColumnDecode { index, source } => ExecutionError::Decode {
                column: index,
                message: source.to_string(),
            },
            other => ExecutionError::Database(other.to_string()),
        }
    }
}
