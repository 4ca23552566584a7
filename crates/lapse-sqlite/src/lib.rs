//! SQLite storage backend for `lapse-store`.
//!
//! # Example
//!
//! ```rust,ignore
//! use lapse_sqlite::SqliteBackend;
//! use lapse_store::{SessionStore, StoreConfig};
//!
//! let backend = SqliteBackend::open("~/.lapse/sessions.db")?;
//! let store = SessionStore::open(backend, StoreConfig::default()).await?;
//! ```

mod backend;
mod error;

pub use backend::SqliteBackend;
pub use error::{Result, SqliteError};
