//! Response generators for the HTTP front end.
//!
//! Functions return `EndpointResponse` instead of writing directly to the
//! session, so routing and response shaping stay testable without a live
//! connection. The caller writes the response.

use std::time::Instant;

use crate::fetcher::{WeatherResponse, RESPONSE_HEADERS};
use crate::metrics::Metrics;

/// Methods advertised in CORS preflight responses
pub const PREFLIGHT_ALLOW_METHODS: &str = "GET, OPTIONS";
/// Request headers advertised in CORS preflight responses
pub const PREFLIGHT_ALLOW_HEADERS: &str = "Content-Type, Authorization, X-Api-Key";

/// Response ready to be written to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl EndpointResponse {
    /// JSON response carrying the CORS header
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            headers: RESPONSE_HEADERS
                .iter()
                .map(|(name, value)| (*name, value.to_string()))
                .collect(),
            body,
        }
    }

    /// Plain text response (for Prometheus metrics)
    pub fn prometheus(body: String) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type", "text/plain; version=0.0.4".to_string())],
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl From<WeatherResponse> for EndpointResponse {
    fn from(response: WeatherResponse) -> Self {
        Self {
            status: response.status,
            headers: response
                .headers
                .into_iter()
                .map(|(name, value)| (name, value.to_string()))
                .collect(),
            body: response.body,
        }
    }
}

/// 204 answer to a CORS preflight
pub fn handle_preflight() -> EndpointResponse {
    EndpointResponse {
        status: 204,
        headers: vec![
            ("Access-Control-Allow-Origin", "*".to_string()),
            ("Access-Control-Allow-Methods", PREFLIGHT_ALLOW_METHODS.to_string()),
            ("Access-Control-Allow-Headers", PREFLIGHT_ALLOW_HEADERS.to_string()),
        ],
        body: String::new(),
    }
}

/// Generate response for /health endpoint.
pub fn handle_health(start_time: Instant) -> EndpointResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION")
    })
    .to_string();

    EndpointResponse::json(200, body)
}

pub fn handle_metrics(metrics: &Metrics) -> EndpointResponse {
    EndpointResponse::prometheus(metrics.export_prometheus())
}

pub fn handle_not_found(path: &str) -> EndpointResponse {
    error_envelope(404, "Not Found", &format!("No route for {}", path))
}

pub fn handle_method_not_allowed(method: &str, path: &str) -> EndpointResponse {
    let mut response = error_envelope(
        405,
        "Method Not Allowed",
        &format!("{} is not supported on {}", method, path),
    );
    response.headers.push(("Allow", PREFLIGHT_ALLOW_METHODS.to_string()));
    response
}

fn error_envelope(status: u16, message: &str, error: &str) -> EndpointResponse {
    let body = serde_json::json!({
        "message": message,
        "error": error,
    })
    .to_string();
    EndpointResponse::json(status, body)
}
