// Kumo weather API accelerator library

pub mod cache;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod format;
pub mod logging;
pub mod metrics;
pub mod origin;
pub mod secrets;
pub mod server;
