//! Storage backend capability.
//!
//! The store never talks to a database directly. It needs a handle that can
//! fetch, upsert and delete records by key, delete a range over the expiry
//! index, count, and provision its table and index. [`Backend`] is that
//! capability set; [`MemoryBackend`](crate::MemoryBackend) and the SQLite
//! backend in `lapse-sqlite` implement it.
//!
//! Implementations are expected to:
//! - make [`upsert`](Backend::upsert) a single atomic replace-on-conflict write,
//! - treat deleting an absent key or an empty range as success,
//! - report `create_table` on an existing table as [`BackendError::TableExists`],
//! - report a missing index from `index_status` as [`BackendError::IndexMissing`],
//! - make `create_index` tolerant of an index that already exists.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::BackendResult;
use crate::record::SessionRecord;

/// Trait for session storage backends.
///
/// All implementations must be `Send + Sync` so one backend can serve
/// concurrent requests and the background sweeper at the same time.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Create `table`. Fails with `TableExists` if it is already there.
    async fn create_table(&self, table: &str) -> BackendResult<()>;

    /// Succeeds if `index` exists on `table`.
    async fn index_status(&self, table: &str, index: &str) -> BackendResult<()>;

    /// Create a secondary index over the field named `index`.
    async fn create_index(&self, table: &str, index: &str) -> BackendResult<()>;

    /// Fetch a record by primary key.
    async fn get_by_key(&self, table: &str, id: &str) -> BackendResult<Option<SessionRecord>>;

    /// Insert `record`, fully replacing any record with the same id.
    async fn upsert(&self, table: &str, record: &SessionRecord) -> BackendResult<()>;

    /// Delete a record by primary key. Returns the number of records removed.
    async fn delete_by_key(&self, table: &str, id: &str) -> BackendResult<u64>;

    /// Delete every record in `table`.
    async fn delete_all(&self, table: &str) -> BackendResult<u64>;

    /// Delete every record whose indexed value lies in `[lower, upper)`.
    async fn delete_by_index_range(
        &self,
        table: &str,
        index: &str,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> BackendResult<u64>;

    /// Number of records in `table`.
    async fn count(&self, table: &str) -> BackendResult<u64>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn create_table(&self, table: &str) -> BackendResult<()> {
        (**self).create_table(table).await
    }

    async fn index_status(&self, table: &str, index: &str) -> BackendResult<()> {
        (**self).index_status(table, index).await
    }

    async fn create_index(&self, table: &str, index: &str) -> BackendResult<()> {
        (**self).create_index(table, index).await
    }

    async fn get_by_key(&self, table: &str, id: &str) -> BackendResult<Option<SessionRecord>> {
        (**self).get_by_key(table, id).await
    }

    async fn upsert(&self, table: &str, record: &SessionRecord) -> BackendResult<()> {
        (**self).upsert(table, record).await
    }

    async fn delete_by_key(&self, table: &str, id: &str) -> BackendResult<u64> {
        (**self).delete_by_key(table, id).await
    }

    async fn delete_all(&self, table: &str) -> BackendResult<u64> {
        (**self).delete_all(table).await
    }

    async fn delete_by_index_range(
        &self,
        table: &str,
        index: &str,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> BackendResult<u64> {
        (**self)
            .delete_by_index_range(table, index, lower, upper)
            .await
    }

    async fn count(&self, table: &str) -> BackendResult<u64> {
        (**self).count(table).await
    }
}
