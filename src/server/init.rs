//! Service initialization logic.
//!
//! Builds the collaborators named by [`Config`] and assembles them into a
//! [`CacheAsideFetcher`]. The AWS SDK configuration is only loaded when a
//! selected backend needs it, so memory/env deployments start without any
//! AWS credentials.

use aws_config::{BehaviorVersion, SdkConfig};
use std::sync::Arc;

use crate::cache::{DynamoDbStore, ExpiringKeyValueStore, MemoryStore, RedisStore};
use crate::config::{AwsConfig, CacheBackend, Config, SecretProvider};
use crate::fetcher::CacheAsideFetcher;
use crate::origin::HttpOriginClient;
use crate::secrets::{EnvSecretStore, SecretStore, SsmSecretStore};

/// Load the shared AWS SDK configuration, applying region and endpoint overrides
pub async fn load_aws_config(aws: &AwsConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &aws.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }
    if let Some(endpoint_url) = &aws.endpoint_url {
        loader = loader.endpoint_url(endpoint_url);
    }
    loader.load().await
}

fn needs_aws(config: &Config) -> bool {
    config.secret.provider == SecretProvider::Ssm || config.cache.backend == CacheBackend::Dynamodb
}

fn require_sdk<'a>(sdk: Option<&'a SdkConfig>, what: &str) -> Result<&'a SdkConfig, String> {
    sdk.ok_or_else(|| format!("{} requires AWS configuration", what))
}

pub fn build_secret_store(
    config: &Config,
    sdk: Option<&SdkConfig>,
) -> Result<Arc<dyn SecretStore>, String> {
    match config.secret.provider {
        SecretProvider::Ssm => {
            let sdk = require_sdk(sdk, "ssm secret provider")?;
            Ok(Arc::new(SsmSecretStore::new(aws_sdk_ssm::Client::new(sdk))))
        }
        SecretProvider::Env => Ok(Arc::new(EnvSecretStore::new())),
    }
}

pub fn build_cache_store(
    config: &Config,
    sdk: Option<&SdkConfig>,
) -> Result<Arc<dyn ExpiringKeyValueStore>, String> {
    let cache = &config.cache;
    match cache.backend {
        CacheBackend::Dynamodb => {
            let sdk = require_sdk(sdk, "dynamodb cache backend")?;
            let table_name = cache
                .table_name
                .clone()
                .ok_or_else(|| "cache.table_name is required for the dynamodb backend".to_string())?;
            Ok(Arc::new(DynamoDbStore::new(
                aws_sdk_dynamodb::Client::new(sdk),
                table_name,
            )))
        }
        CacheBackend::Memory => Ok(Arc::new(MemoryStore::new(cache.memory_max_entries))),
        CacheBackend::Redis => {
            let url = cache
                .redis_url
                .as_deref()
                .ok_or_else(|| "cache.redis_url is required for the redis backend".to_string())?;
            let store = RedisStore::new(url, cache.redis_key_prefix.clone())
                .map_err(|e| e.to_string())?;
            Ok(Arc::new(store))
        }
    }
}

/// Build the fetcher described by `config`
pub async fn build_fetcher(config: &Config) -> Result<CacheAsideFetcher, String> {
    let sdk = if needs_aws(config) {
        Some(load_aws_config(&config.aws).await)
    } else {
        None
    };

    let secrets = build_secret_store(config, sdk.as_ref())?;
    let store = build_cache_store(config, sdk.as_ref())?;
    let origin = HttpOriginClient::new(config.origin.timeout()).map_err(|e| e.to_string())?;
    let settings = config.fetcher_settings()?;

    tracing::info!(
        secret_backend = secrets.backend_name(),
        cache_backend = store.backend_name(),
        ttl_seconds = settings.ttl_seconds,
        default_location = %settings.default_location,
        "Fetcher initialized"
    );

    Ok(CacheAsideFetcher::new(
        settings,
        secrets,
        store,
        Arc::new(origin),
    ))
}
