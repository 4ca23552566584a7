//! In-process backend.
//!
//! Keeps every table in a `HashMap` keyed by session id, plus an ordered
//! `(expires, id)` set once the expiry index has been created, so range
//! deletes only visit expired entries. Useful for tests and for embedding
//! the store where persistence across restarts is not needed.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::trace;

use crate::backend::Backend;
use crate::error::{BackendError, BackendResult};
use crate::record::{EXPIRES_INDEX, SessionRecord};

#[derive(Debug, Default)]
struct MemTable {
    rows: HashMap<String, SessionRecord>,
    /// `None` until the expiry index is created.
    expires: Option<BTreeSet<(DateTime<Utc>, String)>>,
}

impl MemTable {
    fn remove(&mut self, id: &str) -> bool {
        match self.rows.remove(id) {
            Some(old) => {
                if let Some(index) = self.expires.as_mut() {
                    index.remove(&(old.expires_at, old.id));
                }
                true
            }
            None => false,
        }
    }
}

/// Backend that keeps all records in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<String, MemTable>>,
    offline: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable backend: while set, every call fails with
    /// [`BackendError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Whether `table` has been created.
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.lock().contains_key(table)
    }

    fn check_online(&self) -> BackendResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(BackendError::Unavailable("memory backend is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn with_table<R>(
        &self,
        table: &str,
        f: impl FnOnce(&mut MemTable) -> BackendResult<R>,
    ) -> BackendResult<R> {
        self.check_online()?;
        let mut tables = self.tables.lock();
        let t = tables
            .get_mut(table)
            .ok_or_else(|| BackendError::TableMissing(table.to_string()))?;
        f(t)
    }
}

fn index_missing(table: &str, index: &str) -> BackendError {
    BackendError::IndexMissing {
        table: table.to_string(),
        index: index.to_string(),
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn create_table(&self, table: &str) -> BackendResult<()> {
        self.check_online()?;
        let mut tables = self.tables.lock();
        if tables.contains_key(table) {
            return Err(BackendError::TableExists(table.to_string()));
        }
        tables.insert(table.to_string(), MemTable::default());
        Ok(())
    }

    async fn index_status(&self, table: &str, index: &str) -> BackendResult<()> {
        self.with_table(table, |t| {
            if index == EXPIRES_INDEX && t.expires.is_some() {
                Ok(())
            } else {
                Err(index_missing(table, index))
            }
        })
    }

    async fn create_index(&self, table: &str, index: &str) -> BackendResult<()> {
        if index != EXPIRES_INDEX {
            return Err(BackendError::Unavailable(format!(
                "memory backend cannot index field `{index}`"
            )));
        }
        self.with_table(table, |t| {
            if t.expires.is_none() {
                let built = t
                    .rows
                    .values()
                    .map(|r| (r.expires_at, r.id.clone()))
                    .collect();
                t.expires = Some(built);
            }
            Ok(())
        })
    }

    async fn get_by_key(&self, table: &str, id: &str) -> BackendResult<Option<SessionRecord>> {
        self.with_table(table, |t| Ok(t.rows.get(id).cloned()))
    }

    async fn upsert(&self, table: &str, record: &SessionRecord) -> BackendResult<()> {
        self.with_table(table, |t| {
            t.remove(&record.id);
            if let Some(index) = t.expires.as_mut() {
                index.insert((record.expires_at, record.id.clone()));
            }
            t.rows.insert(record.id.clone(), record.clone());
            Ok(())
        })
    }

    async fn delete_by_key(&self, table: &str, id: &str) -> BackendResult<u64> {
        self.with_table(table, |t| Ok(u64::from(t.remove(id))))
    }

    async fn delete_all(&self, table: &str) -> BackendResult<u64> {
        self.with_table(table, |t| {
            let removed = t.rows.len() as u64;
            t.rows.clear();
            if let Some(index) = t.expires.as_mut() {
                index.clear();
            }
            Ok(removed)
        })
    }

    async fn delete_by_index_range(
        &self,
        table: &str,
        index: &str,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> BackendResult<u64> {
        self.with_table(table, |t| {
            if index != EXPIRES_INDEX {
                return Err(index_missing(table, index));
            }
            if lower >= upper {
                return Ok(0);
            }
            let Some(expires) = t.expires.as_mut() else {
                return Err(index_missing(table, index));
            };
            let doomed: Vec<(DateTime<Utc>, String)> = expires
                .range((
                    Bound::Included((lower, String::new())),
                    Bound::Excluded((upper, String::new())),
                ))
                .cloned()
                .collect();
            for key in &doomed {
                expires.remove(key);
                t.rows.remove(&key.1);
            }
            trace!(table, removed = doomed.len(), "Range delete over expiry index");
            Ok(doomed.len() as u64)
        })
    }

    async fn count(&self, table: &str) -> BackendResult<u64> {
        self.with_table(table, |t| Ok(t.rows.len() as u64))
    }
}
