//! Session backend using SQLite.
//!
//! Each store table maps to one SQLite table:
//!
//! ```sql
//! CREATE TABLE "<table>" (
//!     id      TEXT PRIMARY KEY,
//!     expires INTEGER NOT NULL,   -- unix milliseconds
//!     session TEXT NOT NULL       -- JSON payload
//! );
//! CREATE INDEX "<table>_expires_idx" ON "<table>"(expires);
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lapse_store::{Backend, BackendResult, EXPIRES_INDEX, SessionRecord};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Transaction, TransactionBehavior, params};
use tracing::{debug, info};

use crate::error::{Result, SqliteError};

/// How long a statement waits on another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Session backend backed by SQLite.
///
/// Uses WAL mode for better concurrent read performance. All statements run
/// on Tokio's blocking pool against a single connection.
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend").finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;
        // Other processes may hold the write lock while provisioning
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        info!("Session database opened at {:?}", path);
        Ok(Self::from_connection(conn))
    }

    /// Create an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        debug!("In-memory session database created");
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&Connection) -> Result<R> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await?
    }
}

/// Quote a table name, rejecting anything outside `[A-Za-z0-9_]`.
fn ident(name: &str) -> Result<String> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(format!("\"{name}\""))
    } else {
        Err(SqliteError::InvalidIdentifier(name.to_string()))
    }
}

fn index_name(table: &str, index: &str) -> Result<String> {
    if index != EXPIRES_INDEX {
        return Err(SqliteError::UnsupportedIndex(index.to_string()));
    }
    ident(&format!("{table}_{index}_idx"))
}

fn schema_object_exists(conn: &Connection, kind: &str, name: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2",
            params![kind, name],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn require_index(conn: &Connection, table: &str, index: &str) -> Result<()> {
    index_name(table, index)?;
    if schema_object_exists(conn, "index", &format!("{table}_{index}_idx"))? {
        Ok(())
    } else {
        Err(SqliteError::IndexMissing {
            table: table.to_string(),
            index: index.to_string(),
        })
    }
}

fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn row_to_record(id: String, expires: i64, session: String) -> Result<SessionRecord> {
    let expires_at = DateTime::from_timestamp_millis(expires)
        .ok_or_else(|| SqliteError::InvalidData(format!("expires out of range for {id}: {expires}")))?;
    let payload = serde_json::from_str(&session)?;
    Ok(SessionRecord {
        id,
        expires_at,
        payload,
    })
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn create_table(&self, table: &str) -> BackendResult<()> {
        let table = table.to_string();
        self.run(move |conn| {
            let quoted = ident(&table)?;
            // Take the write lock before looking, so concurrent openers of the
            // same file see either no table or a committed one.
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
            if schema_object_exists(&tx, "table", &table)? {
                return Err(SqliteError::TableExists(table));
            }
            tx.execute_batch(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {quoted} (
                    id TEXT PRIMARY KEY,
                    expires INTEGER NOT NULL,
                    session TEXT NOT NULL
                );
                "#
            ))?;
            tx.commit()?;
            debug!(table = %table, "Created table");
            Ok(())
        })
        .await
        .map_err(Into::into)
    }

    async fn index_status(&self, table: &str, index: &str) -> BackendResult<()> {
        let (table, index) = (table.to_string(), index.to_string());
        self.run(move |conn| require_index(conn, &table, &index))
            .await
            .map_err(Into::into)
    }

    async fn create_index(&self, table: &str, index: &str) -> BackendResult<()> {
        let (table, index) = (table.to_string(), index.to_string());
        self.run(move |conn| {
            let quoted_table = ident(&table)?;
            let quoted_index = index_name(&table, &index)?;
            conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS {quoted_index} ON {quoted_table}(expires);"
            ))?;
            Ok(())
        })
        .await
        .map_err(Into::into)
    }

    async fn get_by_key(&self, table: &str, id: &str) -> BackendResult<Option<SessionRecord>> {
        let (table, id) = (table.to_string(), id.to_string());
        self.run(move |conn| {
            let sql = format!("SELECT id, expires, session FROM {} WHERE id = ?1", ident(&table)?);
            let row = conn
                .query_row(&sql, params![id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
                })
                .optional()?;
            row.map(|(id, expires, session)| row_to_record(id, expires, session))
                .transpose()
        })
        .await
        .map_err(Into::into)
    }

    async fn upsert(&self, table: &str, record: &SessionRecord) -> BackendResult<()> {
        let table = table.to_string();
        let id = record.id.clone();
        let expires = millis(record.expires_at);
        let session = serde_json::to_string(&record.payload).map_err(SqliteError::from)?;
        self.run(move |conn| {
            let sql = format!(
                r#"
                INSERT INTO {} (id, expires, session) VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET expires = excluded.expires, session = excluded.session
                "#,
                ident(&table)?
            );
            conn.execute(&sql, params![id, expires, session])?;
            Ok(())
        })
        .await
        .map_err(Into::into)
    }

    async fn delete_by_key(&self, table: &str, id: &str) -> BackendResult<u64> {
        let (table, id) = (table.to_string(), id.to_string());
        self.run(move |conn| {
            let sql = format!("DELETE FROM {} WHERE id = ?1", ident(&table)?);
            Ok(conn.execute(&sql, params![id])? as u64)
        })
        .await
        .map_err(Into::into)
    }

    async fn delete_all(&self, table: &str) -> BackendResult<u64> {
        let table = table.to_string();
        self.run(move |conn| {
            let sql = format!("DELETE FROM {}", ident(&table)?);
            Ok(conn.execute(&sql, [])? as u64)
        })
        .await
        .map_err(Into::into)
    }

    async fn delete_by_index_range(
        &self,
        table: &str,
        index: &str,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> BackendResult<u64> {
        let (table, index) = (table.to_string(), index.to_string());
        let (lower, upper) = (millis(lower), millis(upper));
        self.run(move |conn| {
            require_index(conn, &table, &index)?;
            let sql = format!(
                "DELETE FROM {} WHERE expires >= ?1 AND expires < ?2",
                ident(&table)?
            );
            Ok(conn.execute(&sql, params![lower, upper])? as u64)
        })
        .await
        .map_err(Into::into)
    }

    async fn count(&self, table: &str) -> BackendResult<u64> {
        let table = table.to_string();
        self.run(move |conn| {
            let sql = format!("SELECT COUNT(*) FROM {}", ident(&table)?);
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
        .map_err(Into::into)
    }
}
