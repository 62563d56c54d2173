//! Memory store implementation
//!
//! In-process store backed by moka. Entries keep their own `expires_at`;
//! moka only bounds the number of entries. Useful for local runs and tests
//! where no DynamoDB table exists.

use async_trait::async_trait;

use super::entry::CacheEntry;
use super::error::CacheError;
use super::traits::ExpiringKeyValueStore;

/// MemoryStore wraps moka for the store trait
pub struct MemoryStore {
    cache: moka::future::Cache<String, CacheEntry>,
}

impl MemoryStore {
    /// Create a store holding at most `max_entries` entries
    pub fn new(max_entries: u64) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(max_entries)
            .build();
        Self { cache }
    }

    /// Number of entries currently held
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

#[async_trait]
impl ExpiringKeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.cache.get(key).await)
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.cache.insert(entry.key.clone(), entry).await;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
