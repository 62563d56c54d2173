// Configuration module
//
// Configuration is resolved once at startup, either from a YAML file with
// `${VAR}` references or from plain environment variables, and validated
// eagerly before anything is built from it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_LOCATION_ID, DEFAULT_MEMORY_MAX_ENTRIES, DEFAULT_ORIGIN_BASE_URL,
    DEFAULT_ORIGIN_TIMEOUT_SECS, DEFAULT_ORIGIN_UNITS, DEFAULT_REDIS_KEY_PREFIX,
    DEFAULT_TTL_SECONDS,
};
use crate::fetcher::FetcherSettings;
use crate::origin::WeatherEndpoint;

pub mod server;
pub use server::ServerConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub secret: SecretConfig,
    pub cache: CacheConfig,
    #[serde(default)]
    pub origin: OriginConfig,
    #[serde(default)]
    pub aws: AwsConfig,
    /// Location served by every request
    #[serde(default = "default_location")]
    pub default_location: String,
}

/// Where the origin API key comes from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecretProvider {
    /// AWS SSM Parameter Store (SecureString)
    #[default]
    Ssm,
    /// Process environment, for local runs
    Env,
}

impl FromStr for SecretProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ssm" => Ok(SecretProvider::Ssm),
            "env" => Ok(SecretProvider::Env),
            other => Err(format!("Unknown secret provider '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretConfig {
    #[serde(default)]
    pub provider: SecretProvider,
    /// Parameter name (ssm) or variable name (env) of the API key
    pub parameter_name: String,
}

/// Store backing the cache
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Dynamodb,
    Memory,
    Redis,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dynamodb" => Ok(CacheBackend::Dynamodb),
            "memory" => Ok(CacheBackend::Memory),
            "redis" => Ok(CacheBackend::Redis),
            other => Err(format!("Unknown cache backend '{}'", other)),
        }
    }
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_TTL_SECONDS
}

fn default_memory_max_entries() -> u64 {
    DEFAULT_MEMORY_MAX_ENTRIES
}

fn default_redis_key_prefix() -> String {
    DEFAULT_REDIS_KEY_PREFIX.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    /// DynamoDB table name (dynamodb backend)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// Lifetime of a cached reading (default: 3600)
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Entry bound for the memory backend (default: 1024)
    #[serde(default = "default_memory_max_entries")]
    pub memory_max_entries: u64,
    /// Redis connection URL (redis backend)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
    #[serde(default = "default_redis_key_prefix")]
    pub redis_key_prefix: String,
}

fn default_origin_base_url() -> String {
    DEFAULT_ORIGIN_BASE_URL.to_string()
}

fn default_origin_units() -> String {
    DEFAULT_ORIGIN_UNITS.to_string()
}

fn default_origin_timeout() -> u64 {
    DEFAULT_ORIGIN_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OriginConfig {
    #[serde(default = "default_origin_base_url")]
    pub base_url: String,
    #[serde(default = "default_origin_units")]
    pub units: String,
    /// HTTP client timeout in seconds (default: 10)
    #[serde(default = "default_origin_timeout")]
    pub timeout_seconds: u64,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: default_origin_base_url(),
            units: default_origin_units(),
            timeout_seconds: default_origin_timeout(),
        }
    }
}

impl OriginConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Overrides for the AWS SDK (both optional; the default chain applies otherwise)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AwsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Custom endpoint, e.g. LocalStack
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
}

fn default_location() -> String {
    DEFAULT_LOCATION_ID.to_string()
}

/// Replace every `${VAR}` in `input` using `lookup`
///
/// Fails on the first referenced variable that `lookup` cannot resolve.
pub fn substitute_env_vars<F>(input: &str, lookup: F) -> Result<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

    // First, check that all referenced environment variables exist
    for caps in re.captures_iter(input) {
        let var_name = &caps[1];
        if lookup(var_name).is_none() {
            return Err(format!(
                "Environment variable '{}' is referenced but not set",
                var_name
            ));
        }
    }

    let substituted = re.replace_all(input, |caps: &regex::Captures| {
        lookup(&caps[1]).unwrap_or_default()
    });
    Ok(substituted.into_owned())
}

fn parse_env<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    what: &str,
) -> Result<Option<T>, String> {
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("{} must be {}, got '{}'", name, what, raw)),
        _ => Ok(None),
    }
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        let substituted = substitute_env_vars(yaml, |name| std::env::var(name).ok())?;
        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    /// Build configuration from the process environment
    pub fn from_env() -> Result<Self, String> {
        Self::from_env_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from environment-style variables
    ///
    /// | variable              | field                    | default      |
    /// |-----------------------|--------------------------|--------------|
    /// | `SSM_PARAM_NAME`      | `secret.parameter_name`  | required     |
    /// | `SECRET_PROVIDER`     | `secret.provider`        | `ssm`        |
    /// | `CACHE_BACKEND`       | `cache.backend`          | `dynamodb`   |
    /// | `CACHE_TABLE_NAME`    | `cache.table_name`       | required for dynamodb |
    /// | `CACHE_TTL_SECONDS`   | `cache.ttl_seconds`      | 3600         |
    /// | `REDIS_URL`           | `cache.redis_url`        |              |
    /// | `DEFAULT_LOCATION_ID` | `default_location`       | 1850147      |
    /// | `ORIGIN_BASE_URL`     | `origin.base_url`        | OpenWeatherMap |
    /// | `LISTEN_ADDRESS`      | `server.address`         | 0.0.0.0      |
    /// | `LISTEN_PORT`         | `server.port`            | 8080         |
    /// | `AWS_ENDPOINT_URL`    | `aws.endpoint_url`       |              |
    pub fn from_env_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut server = ServerConfig::default();
        if let Some(address) = lookup("LISTEN_ADDRESS").filter(|v| !v.trim().is_empty()) {
            server.address = address;
        }
        if let Some(port) = parse_env::<u16>(&lookup, "LISTEN_PORT", "a port number")? {
            server.port = port;
        }

        let secret = SecretConfig {
            provider: parse_env(&lookup, "SECRET_PROVIDER", "ssm or env")?.unwrap_or_default(),
            parameter_name: lookup("SSM_PARAM_NAME").unwrap_or_default(),
        };

        let cache = CacheConfig {
            backend: parse_env(&lookup, "CACHE_BACKEND", "dynamodb, memory or redis")?
                .unwrap_or_default(),
            table_name: lookup("CACHE_TABLE_NAME").filter(|v| !v.trim().is_empty()),
            ttl_seconds: parse_env(&lookup, "CACHE_TTL_SECONDS", "a positive integer")?
                .unwrap_or(DEFAULT_TTL_SECONDS),
            memory_max_entries: DEFAULT_MEMORY_MAX_ENTRIES,
            redis_url: lookup("REDIS_URL").filter(|v| !v.trim().is_empty()),
            redis_key_prefix: default_redis_key_prefix(),
        };

        let mut origin = OriginConfig::default();
        if let Some(base_url) = lookup("ORIGIN_BASE_URL").filter(|v| !v.trim().is_empty()) {
            origin.base_url = base_url;
        }

        let aws = AwsConfig {
            region: None,
            endpoint_url: lookup("AWS_ENDPOINT_URL").filter(|v| !v.trim().is_empty()),
        };

        let default_location = lookup("DEFAULT_LOCATION_ID")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(default_location);

        Ok(Config {
            server,
            secret,
            cache,
            origin,
            aws,
            default_location,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;

        if self.secret.parameter_name.trim().is_empty() {
            return Err("secret.parameter_name cannot be empty".to_string());
        }

        if self.default_location.trim().is_empty() {
            return Err("default_location cannot be empty".to_string());
        }

        if self.cache.ttl_seconds == 0 {
            return Err("cache.ttl_seconds must be greater than 0".to_string());
        }

        match self.cache.backend {
            CacheBackend::Dynamodb => {
                let has_table = self
                    .cache
                    .table_name
                    .as_deref()
                    .map(|t| !t.trim().is_empty())
                    .unwrap_or(false);
                if !has_table {
                    return Err(
                        "cache.table_name is required for the dynamodb backend".to_string()
                    );
                }
            }
            CacheBackend::Memory => {
                if self.cache.memory_max_entries == 0 {
                    return Err("cache.memory_max_entries must be greater than 0".to_string());
                }
            }
            CacheBackend::Redis => match self.cache.redis_url.as_deref() {
                Some(url) if url.starts_with("redis://") || url.starts_with("rediss://") => {}
                Some(url) => {
                    return Err(format!(
                        "cache.redis_url must start with redis:// or rediss://, got '{}'",
                        url
                    ))
                }
                None => {
                    return Err("cache.redis_url is required for the redis backend".to_string())
                }
            },
        }

        let base_url = reqwest::Url::parse(&self.origin.base_url)
            .map_err(|e| format!("origin.base_url is invalid: {}", e))?;
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            return Err(format!(
                "origin.base_url must use http or https, got '{}'",
                base_url.scheme()
            ));
        }
        if self.origin.units.trim().is_empty() {
            return Err("origin.units cannot be empty".to_string());
        }
        if self.origin.timeout_seconds == 0 {
            return Err("origin.timeout_seconds must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Settings handed to the fetcher
    pub fn fetcher_settings(&self) -> Result<FetcherSettings, String> {
        let endpoint = WeatherEndpoint::new(&self.origin.base_url, self.origin.units.clone())
            .map_err(|e| e.to_string())?;
        Ok(FetcherSettings {
            secret_name: self.secret.parameter_name.clone(),
            ttl_seconds: self.cache.ttl_seconds,
            default_location: self.default_location.clone(),
            endpoint,
        })
    }
}
