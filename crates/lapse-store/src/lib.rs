//! Session persistence with upsert writes and background expiry.
//!
//! This crate stores web sessions (id → opaque payload + expiry) on behalf
//! of a session middleware:
//! - Atomic upsert writes, expiry computed from a max-age hint or a default
//! - Reads that hand the payload back untouched
//! - A background sweeper that range-deletes expired records via an index
//! - Table and index provisioning before the store reports ready
//!
//! Storage goes through the [`Backend`] trait. [`MemoryBackend`] ships here;
//! `lapse-sqlite` provides a SQLite one.
//!
//! # Example
//!
//! ```rust,ignore
//! use lapse_store::{MemoryBackend, SessionStore, StoreConfig};
//! use serde_json::json;
//!
//! let store = SessionStore::open(MemoryBackend::new(), StoreConfig::default()).await?;
//! store.set("abc", json!({"cookie": {"originalMaxAge": 1000}, "user": "alice"})).await?;
//! let session = store.get("abc").await?;
//! ```

mod backend;
mod bootstrap;
mod config;
mod error;
mod memory;
mod record;
mod store;
mod sweeper;

pub use backend::Backend;
pub use bootstrap::{Readiness, ensure_schema};
pub use config::{
    ConfigError, DEFAULT_BROWSER_SESSIONS_MAX_AGE, DEFAULT_CLEAR_INTERVAL, DEFAULT_TABLE,
    StoreConfig, StoreOptions,
};
pub use error::{BackendError, BackendResult, Error, Result};
pub use memory::MemoryBackend;
pub use record::{EXPIRES_INDEX, RecordCodec, SessionRecord, max_age_hint};
pub use store::{SessionStore, SessionStoreApi};
pub use sweeper::{SweeperHandle, spawn_sweeper, sweep_expired, sweep_expired_before};
