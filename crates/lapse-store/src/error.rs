//! Error types for session store operations.

use crate::config::ConfigError;

/// Error type for session store operations.
///
/// A missing session is not an error: reads return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session identifier was rejected before reaching the backend.
    #[error("Invalid session id: {0:?}")]
    InvalidId(String),

    /// Error surfaced by the storage backend, passed through unchanged.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Table or index provisioning failed, the store cannot be used.
    #[error("Store bootstrap failed: {0}")]
    Bootstrap(String),

    /// Invalid construction options.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The store has been closed.
    #[error("Session store is closed")]
    Closed,
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by a [`Backend`](crate::Backend) implementation.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// `create_table` was called for a table that already exists.
    #[error("Table `{0}` already exists")]
    TableExists(String),

    /// The table has not been created.
    #[error("Table `{0}` does not exist")]
    TableMissing(String),

    /// The requested secondary index has not been created.
    #[error("Index `{index}` on table `{table}` does not exist")]
    IndexMissing { table: String, index: String },

    /// The backend could not be reached or timed out.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("Backend error: {0}")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl BackendError {
    /// Wrap an arbitrary backend error.
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
