// Secrets module
//
// Credential lookup for the weather origin. The fetcher asks for the API key
// on every cache miss and never keeps it between requests.

use async_trait::async_trait;

pub mod env;
pub mod ssm;

pub use env::EnvSecretStore;
pub use ssm::SsmSecretStore;

/// Secret retrieval errors
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// Backend call failed (network, access denied, KMS failure)
    #[error("Secret backend error: {0}")]
    Backend(String),
}

/// Service returning decrypted secrets by name
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch secret `name`
    ///
    /// Returns `Ok(None)` when the secret does not exist.
    async fn get(&self, name: &str, decrypt: bool) -> Result<Option<String>, SecretError>;

    /// Backend label for logs
    fn backend_name(&self) -> &'static str;
}
