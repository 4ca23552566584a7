//! CLI command handlers.

pub mod clear;
pub mod count;
pub mod destroy;
pub mod get;
pub mod set;
pub mod sweep;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use lapse_sqlite::SqliteBackend;
use lapse_store::{SessionStore, StoreConfig};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// SQLite database holding the sessions.
    pub db_path: PathBuf,
    /// Validated store configuration.
    pub config: StoreConfig,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Open the session store and wait for table and index provisioning.
    pub async fn open_store(&self) -> Result<SessionStore<SqliteBackend>> {
        self.open_store_with(self.config.clone()).await
    }

    /// Like [`open_store`](Self::open_store) with a different configuration.
    pub async fn open_store_with(&self, config: StoreConfig) -> Result<SessionStore<SqliteBackend>> {
        let backend = SqliteBackend::open(&self.db_path)
            .with_context(|| format!("failed to open session database {:?}", self.db_path))?;
        let store = SessionStore::open(backend, config).await?;
        Ok(store)
    }
}
