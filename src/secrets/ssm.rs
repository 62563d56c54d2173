//! SSM Parameter Store backend.

use async_trait::async_trait;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::Client;

use super::{SecretError, SecretStore};

/// Reads SecureString parameters from AWS Systems Manager
#[derive(Clone)]
pub struct SsmSecretStore {
    client: Client,
}

impl SsmSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretStore for SsmSecretStore {
    async fn get(&self, name: &str, decrypt: bool) -> Result<Option<String>, SecretError> {
        let result = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(decrypt)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output
                .parameter()
                .and_then(|p| p.value())
                .map(str::to_string)),
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_parameter_not_found())
                    .unwrap_or(false);
                if not_found {
                    Ok(None)
                } else {
                    Err(SecretError::Backend(DisplayErrorContext(&err).to_string()))
                }
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "ssm"
    }
}
