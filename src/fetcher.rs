//! Cache-aside fetcher.
//!
//! `CacheAsideFetcher::handle_request` runs one request through a linear
//! state machine:
//!
//! ```text
//! CHECK_CACHE -- fresh hit --------------------------------------> SHAPE -> RESPOND_OK
//! CHECK_CACHE -- miss/stale -> GET_CREDENTIAL -> FETCH_ORIGIN -> WRITE_CACHE -> SHAPE -> RESPOND_OK
//! GET_CREDENTIAL | FETCH_ORIGIN | SHAPE -- error -------------------------------------> RESPOND_ERROR
//! ```
//!
//! Store failures never leave this module: a failed read is a miss and a
//! failed write is dropped. Every other failure becomes the 500 envelope.
//!
//! The fetcher holds no per-request state, so one instance is shared by all
//! requests. Concurrent misses on the same key may both write back; the last
//! write wins.

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheEntry, ExpiringKeyValueStore};
use crate::clock::{Clock, SystemClock};
use crate::constants::ERROR_ENVELOPE_MESSAGE;
use crate::error::FetchError;
use crate::format::{format, FormattedResult, Source};
use crate::metrics::Metrics;
use crate::origin::{OriginClient, WeatherEndpoint};
use crate::secrets::SecretStore;

/// Headers attached to every weather response
pub const RESPONSE_HEADERS: [(&str, &str); 2] = [
    ("Content-Type", "application/json"),
    ("Access-Control-Allow-Origin", "*"),
];

/// Per-deployment settings resolved from configuration
#[derive(Debug, Clone)]
pub struct FetcherSettings {
    /// Name of the API key in the secret store
    pub secret_name: String,
    /// Lifetime of a written entry
    pub ttl_seconds: u64,
    /// Location served when the request names none
    pub default_location: String,
    /// Origin URL template
    pub endpoint: WeatherEndpoint,
}

/// Terminal response of the handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: String,
}

impl WeatherResponse {
    fn with_body(status: u16, body: String) -> Self {
        Self {
            status,
            headers: RESPONSE_HEADERS.to_vec(),
            body,
        }
    }

    /// 200 carrying a formatted result
    pub fn ok(result: &FormattedResult) -> Result<Self, FetchError> {
        let body = serde_json::to_string(result)
            .map_err(|e| FetchError::Formatting(e.to_string()))?;
        Ok(Self::with_body(200, body))
    }

    /// 500 carrying the `{message, error}` envelope
    pub fn error(err: &FetchError) -> Self {
        let body = serde_json::json!({
            "message": ERROR_ENVELOPE_MESSAGE,
            "error": err.to_string(),
        })
        .to_string();
        Self::with_body(500, body)
    }

    /// Look up a header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&'static str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| *v)
    }
}

/// Orchestrates the secret store, the cache store and the origin
pub struct CacheAsideFetcher {
    settings: FetcherSettings,
    secrets: Arc<dyn SecretStore>,
    store: Arc<dyn ExpiringKeyValueStore>,
    origin: Arc<dyn OriginClient>,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

impl CacheAsideFetcher {
    /// Create a fetcher using the system clock and a fresh metrics registry
    pub fn new(
        settings: FetcherSettings,
        secrets: Arc<dyn SecretStore>,
        store: Arc<dyn ExpiringKeyValueStore>,
        origin: Arc<dyn OriginClient>,
    ) -> Self {
        Self {
            settings,
            secrets,
            store,
            origin,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn settings(&self) -> &FetcherSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Return the payload stored under `key` if it is still fresh
    ///
    /// Absent, stale and unreadable entries all come back as `None`. Stale
    /// entries are left in place for the store's own expiry.
    pub async fn lookup(&self, key: &str) -> Option<Value> {
        match self.store.get(key).await {
            Ok(Some(entry)) => {
                let now = self.clock.now_epoch_seconds();
                if entry.is_fresh(now) {
                    info!(
                        location = %key,
                        expires_in_secs = entry.remaining_ttl(now).num_seconds(),
                        "Cache hit"
                    );
                    self.metrics.increment_cache_hit();
                    Some(entry.payload)
                } else {
                    info!(
                        location = %key,
                        expired_at = entry.expires_at,
                        "Cache entry expired"
                    );
                    self.metrics.increment_cache_stale();
                    None
                }
            }
            Ok(None) => {
                info!(location = %key, "No cache entry found");
                self.metrics.increment_cache_miss();
                None
            }
            Err(e) => {
                warn!(
                    location = %key,
                    backend = self.store.backend_name(),
                    error = %e,
                    "Cache read failed, falling back to origin"
                );
                self.metrics.increment_cache_read_error();
                self.metrics.increment_cache_miss();
                None
            }
        }
    }

    /// Fetch the origin API key
    ///
    /// # Errors
    ///
    /// `FetchError::CredentialUnavailable` if the secret is missing, blank, or
    /// the store call fails.
    pub async fn get_credential(&self, name: &str) -> Result<String, FetchError> {
        match self.secrets.get(name, true).await {
            Ok(Some(value)) if !value.trim().is_empty() => Ok(value),
            Ok(_) => {
                error!(
                    secret = %name,
                    backend = self.secrets.backend_name(),
                    "API key is missing or empty"
                );
                self.metrics.increment_credential_failure();
                Err(FetchError::CredentialUnavailable { source: None })
            }
            Err(e) => {
                error!(
                    secret = %name,
                    backend = self.secrets.backend_name(),
                    error = %e,
                    "Error retrieving API key"
                );
                self.metrics.increment_credential_failure();
                Err(FetchError::CredentialUnavailable { source: Some(e) })
            }
        }
    }

    /// Call the origin once for `location_id`
    ///
    /// # Errors
    ///
    /// `FetchError::OriginUnavailable` on transport failure, non-2xx status,
    /// or a non-JSON body. No retry is attempted.
    pub async fn fetch_origin(
        &self,
        credential: &str,
        location_id: &str,
    ) -> Result<Value, FetchError> {
        let url = self.settings.endpoint.url_for(location_id, credential);
        let started = Instant::now();
        let result = self.origin.get_json(&url).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.record_origin_request(elapsed_ms);

        match result {
            Ok(payload) => {
                debug!(location = %location_id, duration_ms = elapsed_ms, "Origin fetch succeeded");
                Ok(payload)
            }
            Err(e) => {
                error!(
                    location = %location_id,
                    duration_ms = elapsed_ms,
                    error = %e,
                    "Error fetching weather data from origin"
                );
                self.metrics.increment_origin_failure();
                Err(FetchError::OriginUnavailable { source: e })
            }
        }
    }

    /// Write `payload` under `key`, fresh for `ttl_seconds`
    ///
    /// Best-effort: failures are logged and dropped.
    pub async fn store(&self, key: &str, payload: Value, ttl_seconds: u64) {
        let entry = CacheEntry::new(key, payload, self.clock.now(), ttl_seconds);
        let expires_at = entry.expires_at;

        match self.store.put(entry).await {
            Ok(()) => {
                info!(location = %key, expires_at, "Weather data cached");
                self.metrics.increment_cache_write();
            }
            Err(e) => {
                warn!(
                    location = %key,
                    backend = self.store.backend_name(),
                    error = %e,
                    "Cache write failed, continuing without caching"
                );
                self.metrics.increment_cache_write_error();
            }
        }
    }

    /// Run the state machine and return the formatted result
    ///
    /// On origin failure this does not fall back to a stale entry, even when
    /// one exists.
    pub async fn fetch(&self, location_id: &str) -> Result<FormattedResult, FetchError> {
        let (payload, source) = match self.lookup(location_id).await {
            Some(payload) => (payload, Source::Cache),
            None => {
                let credential = self.get_credential(&self.settings.secret_name).await?;
                let payload = self.fetch_origin(&credential, location_id).await?;
                self.store(location_id, payload.clone(), self.settings.ttl_seconds)
                    .await;
                (payload, Source::Api)
            }
        };

        format(&payload, source, self.clock.now()).map_err(|e| {
            error!(location = %location_id, source = %source, error = %e, "Unusable weather payload");
            self.metrics.increment_formatting_failure();
            e
        })
    }

    /// Entry point: serve `location_id`, or the configured default
    pub async fn handle_request(&self, location_id: Option<&str>) -> WeatherResponse {
        let location = location_id.unwrap_or(&self.settings.default_location);

        let outcome = self
            .fetch(location)
            .await
            .and_then(|result| WeatherResponse::ok(&result));

        match outcome {
            Ok(response) => response,
            Err(e) => {
                error!(location = %location, kind = e.kind(), error = %e, "Request failed");
                WeatherResponse::error(&e)
            }
        }
    }
}
