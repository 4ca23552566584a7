//! Background expiration sweeper.
//!
//! Every `clear_interval` the sweeper deletes all records whose expiry lies in
//! `[UNIX_EPOCH, now)` through the expiry index. Ticks run one after another
//! inside a single task, so two sweeps of the same store never overlap. A
//! failed sweep is logged and left to the next tick; deleting an already
//! empty range is a no-op.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::bootstrap::Readiness;
use crate::error::BackendResult;
use crate::record::EXPIRES_INDEX;

/// Delete every record in `table` that expired before now.
///
/// Returns the number of records removed.
pub async fn sweep_expired<B: Backend + ?Sized>(backend: &B, table: &str) -> BackendResult<u64> {
    sweep_expired_before(backend, table, Utc::now()).await
}

/// Delete every record in `table` whose expiry lies in `[UNIX_EPOCH, cutoff)`.
pub async fn sweep_expired_before<B: Backend + ?Sized>(
    backend: &B,
    table: &str,
    cutoff: DateTime<Utc>,
) -> BackendResult<u64> {
    backend
        .delete_by_index_range(table, EXPIRES_INDEX, DateTime::<Utc>::UNIX_EPOCH, cutoff)
        .await
}

/// Handle to a running sweeper task.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SweeperHandle {
    /// Ask the task to stop after its current tick.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_none_or(|task| task.is_finished())
    }

    /// Cancel the task and wait for it to exit.
    pub async fn shutdown(&self) {
        self.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Sweeper task ended abnormally");
            }
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn the sweeper for `table`.
///
/// The first sweep happens one `period` after spawning. Each tick first checks
/// `readiness`: ticks before provisioning completes are skipped, and the task
/// exits if provisioning failed. Must be called within a Tokio runtime.
pub fn spawn_sweeper<B: Backend + ?Sized>(
    backend: Arc<B>,
    table: String,
    period: Duration,
    readiness: watch::Receiver<Readiness>,
    cancel: CancellationToken,
) -> SweeperHandle {
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(table = %table, "Sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let state = readiness.borrow().clone();
            match state {
                Readiness::Ready => {}
                Readiness::Pending => {
                    debug!(table = %table, "Store not ready, skipping sweep");
                    continue;
                }
                Readiness::Failed(reason) => {
                    warn!(table = %table, reason = %reason, "Store bootstrap failed, sweeper exiting");
                    break;
                }
            }

            match sweep_expired(&*backend, &table).await {
                Ok(count) if count > 0 => {
                    info!(table = %table, deleted = count, "Deleted expired sessions");
                }
                Ok(_) => {
                    debug!(table = %table, "Sweep found no expired sessions");
                }
                Err(e) => {
                    warn!(table = %table, error = %e, "Session sweep failed");
                }
            }
        }
    });

    SweeperHandle {
        cancel,
        task: Mutex::new(Some(task)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::ensure_schema;
    use crate::memory::MemoryBackend;
    use crate::record::SessionRecord;
    use chrono::TimeDelta;
    use serde_json::json;

    async fn seeded() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        ensure_schema(&*backend, "session").await.unwrap();
        let now = Utc::now();
        for (id, offset) in [("gone", -60), ("also-gone", -1), ("kept", 3600)] {
            let record = SessionRecord {
                id: id.to_string(),
                expires_at: now + TimeDelta::seconds(offset),
                payload: json!({}),
            };
            backend.upsert("session", &record).await.unwrap();
        }
        backend
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let backend = seeded().await;

        assert_eq!(sweep_expired(&*backend, "session").await.unwrap(), 2);
        assert_eq!(backend.count("session").await.unwrap(), 1);
        assert_eq!(sweep_expired(&*backend, "session").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_runs_periodically() {
        let backend = seeded().await;
        let (_tx, rx) = watch::channel(Readiness::Ready);

        let handle = spawn_sweeper(
            Arc::clone(&backend),
            "session".to_string(),
            Duration::from_millis(20),
            rx,
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.count("session").await.unwrap(), 1);

        handle.shutdown().await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_sweeper_survives_backend_errors() {
        let backend = seeded().await;
        let (_tx, rx) = watch::channel(Readiness::Ready);
        backend.set_offline(true);

        let handle = spawn_sweeper(
            Arc::clone(&backend),
            "session".to_string(),
            Duration::from_millis(20),
            rx,
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(!handle.is_finished());

        backend.set_offline(false);
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(backend.count("session").await.unwrap(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweeper_waits_for_readiness() {
        let backend = seeded().await;
        let (tx, rx) = watch::channel(Readiness::Pending);

        let handle = spawn_sweeper(
            Arc::clone(&backend),
            "session".to_string(),
            Duration::from_millis(20),
            rx,
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(backend.count("session").await.unwrap(), 3);

        tx.send(Readiness::Ready).unwrap();
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(backend.count("session").await.unwrap(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_sweeper_exits_on_failed_bootstrap() {
        let backend = seeded().await;
        let (_tx, rx) = watch::channel(Readiness::Failed("boom".to_string()));

        let handle = spawn_sweeper(
            Arc::clone(&backend),
            "session".to_string(),
            Duration::from_millis(10),
            rx,
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(handle.is_finished());
        assert_eq!(backend.count("session").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_drop_cancels_task() {
        let backend = seeded().await;
        let (_tx, rx) = watch::channel(Readiness::Ready);
        let token = CancellationToken::new();

        let handle = spawn_sweeper(
            backend,
            "session".to_string(),
            Duration::from_secs(3600),
            rx,
            token.clone(),
        );
        drop(handle);

        assert!(token.is_cancelled());
    }
}
