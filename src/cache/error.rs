//! Cache error types
//!
//! This module defines error types for store operations. None of them ever
//! reach a caller of the weather endpoint; the fetcher degrades instead.

/// Cache error types
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Backend request failed (DynamoDB service error, network, throttling)
    #[error("Store backend error: {0}")]
    Backend(String),
    /// Redis connection failed
    #[error("Redis connection failed: {0}")]
    RedisConnectionFailed(String),
    /// Redis operation error
    #[error("Redis error: {0}")]
    RedisError(String),
    /// Stored item could not be decoded or encoded
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::SerializationError(err.to_string())
    }
}

impl From<::redis::RedisError> for CacheError {
    fn from(err: ::redis::RedisError) -> Self {
        CacheError::RedisError(err.to_string())
    }
}
