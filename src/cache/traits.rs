//! Store trait definition
//!
//! This module defines the `ExpiringKeyValueStore` trait that every cache
//! backend implements. The trait provides a common interface for the
//! DynamoDB, Redis and in-process stores.

use async_trait::async_trait;

use super::entry::CacheEntry;
use super::error::CacheError;

/// Key-value store whose items carry their own expiration instant
#[async_trait]
pub trait ExpiringKeyValueStore: Send + Sync {
    /// Get the entry stored under `key`
    ///
    /// Backends may return stale entries that their own sweeper has not
    /// removed yet; callers must check `CacheEntry::is_fresh`.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Upsert `entry` under `entry.key`, fully replacing any previous value
    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Backend label for logs and metrics
    fn backend_name(&self) -> &'static str;
}
