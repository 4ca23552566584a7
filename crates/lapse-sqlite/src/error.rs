//! Error types for the SQLite backend.

use lapse_store::BackendError;
use thiserror::Error;

/// Errors that can occur in the SQLite backend.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// Database connection or operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem error while preparing the database location.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Session payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking database task panicked or was cancelled.
    #[error("Database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Table or index name that cannot be used as an SQL identifier.
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Only the expiry field can be indexed.
    #[error("Unsupported index: {0}")]
    UnsupportedIndex(String),

    /// A stored row could not be turned back into a record.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// `create_table` on an existing table.
    #[error("Table already exists: {0}")]
    TableExists(String),

    /// The expiry index has not been created.
    #[error("Index {index} on {table} does not exist")]
    IndexMissing { table: String, index: String },
}

/// Result type alias for SQLite backend operations.
pub type Result<T> = std::result::Result<T, SqliteError>;

impl From<SqliteError> for BackendError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::TableExists(table) => BackendError::TableExists(table),
            SqliteError::IndexMissing { table, index } => {
                BackendError::IndexMissing { table, index }
            }
            SqliteError::Database(rusqlite::Error::SqliteFailure(code, message)) => {
                if let Some(table) = message
                    .as_deref()
                    .and_then(|m| m.strip_prefix("no such table: "))
                {
                    return BackendError::TableMissing(table.to_string());
                }
                // Lost a CREATE TABLE race against another connection
                if let Some(table) = message
                    .as_deref()
                    .and_then(|m| m.strip_prefix("table "))
                    .and_then(|m| m.strip_suffix(" already exists"))
                {
                    return BackendError::TableExists(table.trim_matches('"').to_string());
                }
                match code.code {
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                        BackendError::Unavailable(
                            message.unwrap_or_else(|| code.to_string()),
                        )
                    }
                    _ => BackendError::other(SqliteError::Database(
                        rusqlite::Error::SqliteFailure(code, message),
                    )),
                }
            }
            other => BackendError::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_table_mapped() {
        let err = SqliteError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some("no such table: session".to_string()),
        ));
        match BackendError::from(err) {
            BackendError::TableMissing(table) => assert_eq!(table, "session"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_existing_table_mapped() {
        let err = SqliteError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some("table \"session\" already exists".to_string()),
        ));
        match BackendError::from(err) {
            BackendError::TableExists(table) => assert_eq!(table, "session"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_busy_is_unavailable() {
        let err = SqliteError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(5),
            None,
        ));
        assert!(matches!(
            BackendError::from(err),
            BackendError::Unavailable(_)
        ));
    }

    #[test]
    fn test_other_errors_wrapped() {
        let err = SqliteError::InvalidData("bad expires".to_string());
        let mapped = BackendError::from(err);
        assert!(matches!(mapped, BackendError::Other(_)));
        assert!(mapped.to_string().contains("bad expires"));
    }
}
