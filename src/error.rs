// Error types module

use crate::cache::CacheError;
use crate::origin::OriginError;
use crate::secrets::SecretError;

/// Errors raised while serving a weather request.
///
/// Only `CacheUnavailable` is ever recovered locally (degrade to a miss on
/// read, drop on write). Every other variant aborts the request and is
/// rendered as the 500 envelope.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Store read/write failed
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(#[from] CacheError),

    /// Secret missing, empty, or retrieval failed
    #[error("Failed to retrieve API key")]
    CredentialUnavailable {
        #[source]
        source: Option<SecretError>,
    },

    /// Upstream call failed or returned an error status
    #[error("Failed to fetch weather data from OpenWeatherMap")]
    OriginUnavailable {
        #[source]
        source: OriginError,
    },

    /// Successful payload did not have the expected shape
    #[error("Failed to format weather data: {0}")]
    Formatting(String),
}

impl FetchError {
    /// Short label used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::CacheUnavailable(_) => "cache_unavailable",
            FetchError::CredentialUnavailable { .. } => "credential_unavailable",
            FetchError::OriginUnavailable { .. } => "origin_unavailable",
            FetchError::Formatting(_) => "formatting_error",
        }
    }

    /// Whether this error must abort the request
    pub fn is_fatal(&self) -> bool {
        !matches!(self, FetchError::CacheUnavailable(_))
    }
}
