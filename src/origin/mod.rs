//! Weather origin client.
//!
//! Fetches the current reading for one location from the OpenWeatherMap
//! current-weather endpoint. One attempt per call; the only deadline is the
//! HTTP client's timeout.
//!
//! The request URL carries the API key as a query parameter, so neither the
//! URL nor reqwest's URL-bearing error text is ever logged or returned. Use
//! [`redact_url`] when a URL has to appear in a log line.

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Origin call errors
#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    /// Connection, TLS, or timeout failure
    #[error("transport error: {0}")]
    Transport(String),
    /// Upstream answered with a non-success status
    #[error("upstream returned status {0}")]
    Status(u16),
    /// Upstream answered 2xx with a body that is not JSON
    #[error("invalid response body: {0}")]
    InvalidBody(String),
    /// Client could not be constructed
    #[error("client configuration error: {0}")]
    Configuration(String),
}

/// HTTP data origin
#[async_trait]
pub trait OriginClient: Send + Sync {
    /// GET `url` and parse the body as JSON
    async fn get_json(&self, url: &Url) -> Result<Value, OriginError>;
}

/// URL template for the current-weather endpoint
#[derive(Debug, Clone)]
pub struct WeatherEndpoint {
    base_url: Url,
    units: String,
}

impl WeatherEndpoint {
    /// # Errors
    ///
    /// Returns `OriginError::Configuration` if `base_url` is not an absolute URL.
    pub fn new(base_url: &str, units: impl Into<String>) -> Result<Self, OriginError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| OriginError::Configuration(format!("invalid origin URL: {e}")))?;
        Ok(Self {
            base_url,
            units: units.into(),
        })
    }

    /// Build the request URL: `?id=<location>&appid=<credential>&units=<units>`
    pub fn url_for(&self, location_id: &str, credential: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("id", location_id)
            .append_pair("appid", credential)
            .append_pair("units", &self.units);
        url
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

/// Copy of `url` with the `appid` value masked
pub fn redact_url(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if k == "appid" {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

/// reqwest-based origin client
#[derive(Debug, Clone)]
pub struct HttpOriginClient {
    client: reqwest::Client,
}

impl HttpOriginClient {
    /// # Errors
    ///
    /// Returns `OriginError::Configuration` if the HTTP client cannot be created
    /// (e.g., TLS backend initialization failure).
    pub fn new(timeout: Duration) -> Result<Self, OriginError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("kumo/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| {
                OriginError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl OriginClient for HttpOriginClient {
    async fn get_json(&self, url: &Url) -> Result<Value, OriginError> {
        debug!(url = %redact_url(url), "Requesting weather origin");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| OriginError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OriginError::Status(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| OriginError::InvalidBody(e.without_url().to_string()))
    }
}
