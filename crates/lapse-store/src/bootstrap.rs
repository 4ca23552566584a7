//! Table and index provisioning run when a store is constructed.

use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::{BackendError, Error, Result};
use crate::record::EXPIRES_INDEX;

/// Readiness of a store, published once provisioning finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Provisioning is still running.
    Pending,
    /// Table and expiry index exist.
    Ready,
    /// Provisioning failed; the store is unusable.
    Failed(String),
}

/// Make sure `table` and its expiry index exist.
///
/// An existing table is fine. Any other table failure is fatal. A missing
/// index is created; any other index status failure is logged and creation
/// is attempted anyway.
pub async fn ensure_schema<B: Backend + ?Sized>(backend: &B, table: &str) -> Result<()> {
    match backend.create_table(table).await {
        Ok(()) => info!(table, "Created session table"),
        Err(BackendError::TableExists(_)) => debug!(table, "Session table already exists"),
        Err(e) => {
            return Err(Error::Bootstrap(format!(
                "failed to create table `{table}`: {e}"
            )));
        }
    }

    match backend.index_status(table, EXPIRES_INDEX).await {
        Ok(()) => {
            debug!(table, index = EXPIRES_INDEX, "Expiry index present");
            return Ok(());
        }
        Err(BackendError::IndexMissing { .. }) => {
            debug!(table, index = EXPIRES_INDEX, "Expiry index missing");
        }
        Err(e) => {
            warn!(
                table,
                index = EXPIRES_INDEX,
                error = %e,
                "Unexpected index status, creating index anyway"
            );
        }
    }

    backend
        .create_index(table, EXPIRES_INDEX)
        .await
        .map_err(|e| {
            Error::Bootstrap(format!(
                "failed to create index `{EXPIRES_INDEX}` on `{table}`: {e}"
            ))
        })?;
    info!(table, index = EXPIRES_INDEX, "Created expiry index");
    Ok(())
}
