//! The session store engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::backend::Backend;
use crate::bootstrap::{Readiness, ensure_schema};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::record::{RecordCodec, max_age_hint};
use crate::sweeper::{SweeperHandle, spawn_sweeper, sweep_expired};

/// What a session middleware needs from a store.
///
/// Hosts depend on this trait rather than on [`SessionStore`] directly.
#[async_trait]
pub trait SessionStoreApi: Send + Sync {
    /// Resolves once the store can serve requests.
    async fn ready(&self) -> Result<()>;

    /// Load a session payload. `Ok(None)` if there is no such session.
    async fn get(&self, id: &str) -> Result<Option<Value>>;

    /// Insert or fully replace a session.
    async fn set(&self, id: &str, session: Value) -> Result<()>;

    /// Delete a session. Deleting an absent session succeeds.
    async fn destroy(&self, id: &str) -> Result<()>;

    /// Delete every session. Returns how many were removed.
    async fn clear(&self) -> Result<u64>;

    /// Number of stored sessions, including expired ones not yet swept.
    async fn length(&self) -> Result<u64>;
}

/// Session store over a [`Backend`].
///
/// Construction validates the configuration, then provisions the table and
/// expiry index in the background and starts the expiration sweeper.
/// Operations issued before provisioning completes wait for it; if
/// provisioning fails they return [`Error::Bootstrap`].
///
/// The sweeper stops on [`close`](Self::close) or when the store is dropped.
pub struct SessionStore<B: Backend> {
    backend: Arc<B>,
    config: StoreConfig,
    codec: RecordCodec,
    readiness: watch::Receiver<Readiness>,
    shutdown: CancellationToken,
    sweeper: SweeperHandle,
}

impl<B: Backend> std::fmt::Debug for SessionStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .field("readiness", &*self.readiness.borrow())
            .field("closed", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<B: Backend> SessionStore<B> {
    /// Create a store and start provisioning.
    ///
    /// Returns immediately; use [`ready`](Self::ready) to wait for
    /// provisioning. Fails synchronously with [`Error::Config`] before any
    /// backend call if the configuration is invalid. Must be called within a
    /// Tokio runtime.
    pub fn new(backend: B, config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let backend = Arc::new(backend);
        let (ready_tx, readiness) = watch::channel(Readiness::Pending);

        {
            let backend = Arc::clone(&backend);
            let table = config.table().to_string();
            tokio::spawn(async move {
                let state = match ensure_schema(&*backend, &table).await {
                    Ok(()) => {
                        info!(table = %table, "Session store ready");
                        Readiness::Ready
                    }
                    Err(e) => {
                        error!(table = %table, error = %e, "Session store bootstrap failed");
                        let reason = match e {
                            Error::Bootstrap(reason) => reason,
                            other => other.to_string(),
                        };
                        Readiness::Failed(reason)
                    }
                };
                let _ = ready_tx.send(state);
            });
        }

        let shutdown = CancellationToken::new();
        let sweeper = spawn_sweeper(
            Arc::clone(&backend),
            config.table().to_string(),
            config.clear_interval(),
            readiness.clone(),
            shutdown.child_token(),
        );

        Ok(Self {
            backend,
            codec: RecordCodec::new(config.browser_sessions_max_age()),
            config,
            readiness,
            shutdown,
            sweeper,
        })
    }

    /// Create a store and wait until it is ready.
    pub async fn open(backend: B, config: StoreConfig) -> Result<Self> {
        let store = Self::new(backend, config)?;
        store.ready().await?;
        Ok(store)
    }

    /// Get the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Current provisioning state, without waiting.
    pub fn readiness(&self) -> Readiness {
        self.readiness.borrow().clone()
    }

    /// Wait for provisioning to finish.
    pub async fn ready(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Closed);
        }
        let mut rx = self.readiness.clone();
        let state = rx
            .wait_for(|s| *s != Readiness::Pending)
            .await
            .map_err(|_| Error::Bootstrap("bootstrap task ended without reporting".to_string()))?
            .clone();
        match state {
            Readiness::Failed(reason) => Err(Error::Bootstrap(reason)),
            Readiness::Ready | Readiness::Pending => Ok(()),
        }
    }

    /// Load a session payload by id.
    pub async fn get(&self, id: &str) -> Result<Option<Value>> {
        self.ready().await?;
        debug!(session_id = %id, "Getting session");
        let record = self.backend.get_by_key(self.config.table(), id).await?;
        debug!(session_id = %id, found = record.is_some(), "Got session");
        Ok(RecordCodec::decode(record))
    }

    /// Insert or replace a session.
    ///
    /// Expiry comes from the payload's `cookie.originalMaxAge` hint, or the
    /// configured `browser_sessions_max_age`.
    pub async fn set(&self, id: &str, session: Value) -> Result<()> {
        let hint = max_age_hint(&session);
        self.write(id, session, hint).await
    }

    /// Insert or replace a session with an explicit max-age.
    pub async fn set_with_max_age(&self, id: &str, session: Value, max_age: Duration) -> Result<()> {
        self.write(id, session, Some(max_age)).await
    }

    async fn write(&self, id: &str, session: Value, max_age: Option<Duration>) -> Result<()> {
        let record = self.codec.encode(id, session, max_age)?;
        self.ready().await?;
        debug!(
            session_id = %id,
            expires_at = %record.expires_at,
            "Setting session"
        );
        self.backend.upsert(self.config.table(), &record).await?;
        debug!(session_id = %id, "Set session");
        Ok(())
    }

    /// Delete a session by id. Absent ids succeed silently.
    pub async fn destroy(&self, id: &str) -> Result<()> {
        self.ready().await?;
        debug!(session_id = %id, "Deleting session");
        let deleted = self.backend.delete_by_key(self.config.table(), id).await?;
        debug!(session_id = %id, deleted, "Deleted session");
        Ok(())
    }

    /// Delete every session regardless of expiry.
    pub async fn clear(&self) -> Result<u64> {
        self.ready().await?;
        let deleted = self.backend.delete_all(self.config.table()).await?;
        info!(table = %self.config.table(), deleted, "Cleared session table");
        Ok(deleted)
    }

    /// Number of stored sessions, expired or not.
    pub async fn length(&self) -> Result<u64> {
        self.ready().await?;
        Ok(self.backend.count(self.config.table()).await?)
    }

    /// Run one expiration sweep now. Returns the number of records removed.
    pub async fn sweep(&self) -> Result<u64> {
        self.ready().await?;
        let deleted = sweep_expired(&*self.backend, self.config.table()).await?;
        debug!(table = %self.config.table(), deleted, "Deleted expired sessions");
        Ok(deleted)
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stop the sweeper and reject further operations with [`Error::Closed`].
    pub async fn close(&self) {
        self.shutdown.cancel();
        self.sweeper.shutdown().await;
        debug!(table = %self.config.table(), "Session store closed");
    }
}

impl<B: Backend> Drop for SessionStore<B> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl<B: Backend> SessionStoreApi for SessionStore<B> {
    async fn ready(&self) -> Result<()> {
        SessionStore::ready(self).await
    }

    async fn get(&self, id: &str) -> Result<Option<Value>> {
        SessionStore::get(self, id).await
    }

    async fn set(&self, id: &str, session: Value) -> Result<()> {
        SessionStore::set(self, id, session).await
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        SessionStore::destroy(self, id).await
    }

    async fn clear(&self) -> Result<u64> {
        SessionStore::clear(self).await
    }

    async fn length(&self) -> Result<u64> {
        SessionStore::length(self).await
    }
}
