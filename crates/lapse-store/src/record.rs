//! Persisted session envelope and the rules for computing expiry.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Name of the secondary index over [`SessionRecord::expires_at`].
pub const EXPIRES_INDEX: &str = "expires";

/// A session as it is stored by a backend.
///
/// Serializes as `{ "id": ..., "expires": <unix millis>, "session": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier, the primary key.
    pub id: String,

    /// Instant after which the record is dead and may be swept.
    #[serde(rename = "expires", with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,

    /// Opaque session state owned by the host framework.
    #[serde(rename = "session")]
    pub payload: Value,
}

impl SessionRecord {
    /// Whether a sweep at `now` would remove this record.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Translates between host payloads and [`SessionRecord`]s.
#[derive(Debug, Clone, Copy)]
pub struct RecordCodec {
    default_max_age: Duration,
}

impl RecordCodec {
    /// Create a codec that falls back to `default_max_age`.
    pub fn new(default_max_age: Duration) -> Self {
        Self { default_max_age }
    }

    /// Max-age used when neither an override nor a payload hint is present.
    pub fn default_max_age(&self) -> Duration {
        self.default_max_age
    }

    /// Build the envelope for `payload`, expiring `max_age` (or the default) from now.
    pub fn encode(&self, id: &str, payload: Value, max_age: Option<Duration>) -> Result<SessionRecord> {
        self.encode_at(id, payload, max_age, Utc::now())
    }

    /// Like [`encode`](Self::encode) with an explicit current instant.
    pub fn encode_at(
        &self,
        id: &str,
        payload: Value,
        max_age: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord> {
        if id.is_empty() {
            return Err(Error::InvalidId(id.to_string()));
        }
        let max_age = max_age.unwrap_or(self.default_max_age);
        Ok(SessionRecord {
            id: id.to_string(),
            expires_at: expiry_from(now, max_age),
            payload,
        })
    }

    /// Extract the payload. The payload is handed back exactly as stored.
    pub fn decode(record: Option<SessionRecord>) -> Option<Value> {
        record.map(|r| r.payload)
    }
}

/// Read the max-age hint a session middleware embeds in its payload.
///
/// Looks at `cookie.originalMaxAge` (milliseconds). Missing, `null`, zero,
/// negative or non-numeric values mean "no hint".
pub fn max_age_hint(payload: &Value) -> Option<Duration> {
    let ms = payload.get("cookie")?.get("originalMaxAge")?.as_f64()?;
    if ms.is_finite() && ms >= 1.0 {
        Some(Duration::from_millis(ms as u64))
    } else {
        None
    }
}

fn expiry_from(now: DateTime<Utc>, max_age: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(max_age)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
