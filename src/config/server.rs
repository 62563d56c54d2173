//! Server configuration types.
//!
//! This module defines the server-level configuration including:
//! - Address and port bindings
//! - Worker thread count
//! - Routes served by the weather handler
//!
//! Default values are sourced from `crate::constants`.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_LISTEN_ADDRESS, DEFAULT_LISTEN_PORT, DEFAULT_THREADS, DEFAULT_WEATHER_ROUTES,
    HEALTH_PATH, METRICS_PATH,
};

fn default_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

// Default worker thread count
fn default_threads() -> usize {
    DEFAULT_THREADS
}

fn default_routes() -> Vec<String> {
    DEFAULT_WEATHER_ROUTES.iter().map(|r| r.to_string()).collect()
}

/// HTTP front-end configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Number of worker threads (default: 4)
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Equivalent paths that all serve the weather handler
    #[serde(default = "default_routes")]
    pub routes: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            threads: default_threads(),
            routes: default_routes(),
        }
    }
}

impl ServerConfig {
    /// `address:port` for the TCP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.address.trim().is_empty() {
            return Err("server.address cannot be empty".to_string());
        }
        if self.port == 0 {
            return Err("server.port must be greater than 0".to_string());
        }
        if self.threads == 0 {
            return Err("server.threads must be greater than 0".to_string());
        }
        if self.routes.is_empty() {
            return Err("server.routes must contain at least one route".to_string());
        }
        for route in &self.routes {
            if !route.starts_with('/') {
                return Err(format!("Route '{}' must start with /", route));
            }
            if route == HEALTH_PATH || route == METRICS_PATH {
                return Err(format!(
                    "Route '{}' conflicts with a built-in endpoint",
                    route
                ));
            }
        }
        Ok(())
    }
}
