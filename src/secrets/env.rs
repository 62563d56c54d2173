//! Environment-variable backend for local runs.
//!
//! The secret name is used as the variable name, so
//! `secret.parameter_name: OPENWEATHER_API_KEY` reads `$OPENWEATHER_API_KEY`.

use async_trait::async_trait;
use std::collections::HashMap;

use super::{SecretError, SecretStore};

/// Resolves secrets from the process environment, or from a fixed map
#[derive(Debug, Default, Clone)]
pub struct EnvSecretStore {
    overrides: Option<HashMap<String, String>>,
}

impl EnvSecretStore {
    /// Read from the process environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Read only from `values`, ignoring the environment
    pub fn from_map(values: HashMap<String, String>) -> Self {
        Self {
            overrides: Some(values),
        }
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get(&self, name: &str, _decrypt: bool) -> Result<Option<String>, SecretError> {
        match &self.overrides {
            Some(values) => Ok(values.get(name).cloned()),
            None => match std::env::var(name) {
                Ok(value) => Ok(Some(value)),
                Err(std::env::VarError::NotPresent) => Ok(None),
                Err(e) => Err(SecretError::Backend(format!(
                    "environment variable {name} is unreadable: {e}"
                ))),
            },
        }
    }

    fn backend_name(&self) -> &'static str {
        "env"
    }
}
