// Redis store implementation
//
// Entries are stored as JSON under `<prefix><key>` and written with
// `SET ... EXAT <expires_at>` so Redis drops them on its own once stale.
// The connection manager is created on first use so its background task
// lives on the serving runtime.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::sync::OnceCell;

use super::entry::CacheEntry;
use super::error::CacheError;
use super::traits::ExpiringKeyValueStore;

/// Redis-based store
pub struct RedisStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    key_prefix: String,
}

impl RedisStore {
    /// Creates a new RedisStore without connecting
    ///
    /// # Errors
    ///
    /// Returns CacheError::ConfigurationError if the URL cannot be parsed.
    pub fn new(redis_url: &str, key_prefix: impl Into<String>) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)
            .map_err(|e| CacheError::ConfigurationError(format!("Invalid Redis URL: {}", e)))?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            key_prefix: key_prefix.into(),
        })
    }

    /// Full Redis key for a location
    pub fn redis_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                ConnectionManager::new(self.client.clone())
                    .await
                    .map_err(|e| {
                        CacheError::RedisConnectionFailed(format!(
                            "Failed to connect to Redis: {}",
                            e
                        ))
                    })
            })
            .await?;
        // ConnectionManager is a cheap multiplexed handle
        Ok(manager.clone())
    }
}

#[async_trait]
impl ExpiringKeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn.get(self.redis_key(key)).await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let json = serde_json::to_string(&entry)?;

        redis::cmd("SET")
            .arg(self.redis_key(&entry.key))
            .arg(json)
            .arg("EXAT")
            .arg(entry.expires_at)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
