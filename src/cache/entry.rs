//! Cache entry type
//!
//! A `CacheEntry` holds one raw upstream reading together with the absolute
//! instant after which it must no longer be served.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Cached upstream payload for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Location identifier the payload belongs to
    pub key: String,
    /// Raw upstream JSON document
    pub payload: serde_json::Value,
    /// Expiration instant, seconds since epoch
    pub expires_at: i64,
    /// When this entry was written (informational)
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Build an entry written at `now` that stays fresh for `ttl_seconds`
    pub fn new(
        key: impl Into<String>,
        payload: serde_json::Value,
        now: DateTime<Utc>,
        ttl_seconds: u64,
    ) -> Self {
        let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        Self {
            key: key.into(),
            payload,
            expires_at: now.timestamp().saturating_add(ttl),
            stored_at: now,
        }
    }

    /// Fresh iff `expires_at > now`
    pub fn is_fresh(&self, now_epoch_seconds: i64) -> bool {
        self.expires_at > now_epoch_seconds
    }

    /// Seconds of freshness left, zero once stale
    pub fn remaining_ttl(&self, now_epoch_seconds: i64) -> Duration {
        Duration::seconds((self.expires_at - now_epoch_seconds).max(0))
    }
}
