// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers keeps the config layer, the
// environment loader and the tests in agreement.

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

/// Default number of worker threads
pub const DEFAULT_THREADS: usize = 4;

/// Routes served by the weather handler when none are configured
pub const DEFAULT_WEATHER_ROUTES: [&str; 2] = ["/weather", "/tokyo"];

/// Liveness endpoint
pub const HEALTH_PATH: &str = "/health";

/// Prometheus scrape endpoint
pub const METRICS_PATH: &str = "/metrics";

// =============================================================================
// Cache defaults
// =============================================================================

/// Default TTL in seconds
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Default maximum number of entries held by the in-process store
pub const DEFAULT_MEMORY_MAX_ENTRIES: u64 = 1024;

/// Default key prefix for the Redis store
pub const DEFAULT_REDIS_KEY_PREFIX: &str = "kumo:";

/// DynamoDB partition key attribute
pub const DYNAMODB_KEY_ATTRIBUTE: &str = "cityId";

/// DynamoDB attribute holding the raw payload document
pub const DYNAMODB_PAYLOAD_ATTRIBUTE: &str = "weatherData";

/// DynamoDB attribute holding the expiration instant (table TTL attribute)
pub const DYNAMODB_TTL_ATTRIBUTE: &str = "ttl";

/// DynamoDB attribute holding the write instant
pub const DYNAMODB_STORED_AT_ATTRIBUTE: &str = "timestamp";

// =============================================================================
// Origin defaults
// =============================================================================

/// OpenWeatherMap current-weather endpoint
pub const DEFAULT_ORIGIN_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Unit system requested from the origin
pub const DEFAULT_ORIGIN_UNITS: &str = "metric";

/// Origin HTTP timeout in seconds
pub const DEFAULT_ORIGIN_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Location defaults
// =============================================================================

/// OpenWeatherMap city id for Tokyo
pub const DEFAULT_LOCATION_ID: &str = "1850147";

// =============================================================================
// Response envelope
// =============================================================================

/// Message carried by every failure envelope
pub const ERROR_ENVELOPE_MESSAGE: &str = "Error fetching weather data";
