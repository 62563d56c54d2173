// Cache module
//
// Expiring key-value stores used by the cache-aside fetcher. Every backend
// stores the same `CacheEntry`; freshness is always decided by the caller
// against `expires_at`, never by the backend's own eviction.

pub mod dynamodb;
pub mod entry;
pub mod error;
pub mod memory;
pub mod redis;
pub mod traits;

pub use dynamodb::DynamoDbStore;
pub use entry::CacheEntry;
pub use error::CacheError;
pub use memory::MemoryStore;
pub use redis::RedisStore;
pub use traits::ExpiringKeyValueStore;
