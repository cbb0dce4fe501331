//! Environment-backed credential provider.

use anyhow::Context;
use async_trait::async_trait;

use deploy::{CredentialProvider, Credentials, DeployError};

/// Resolves cloud credentials from the process environment at call
/// time. Credentials are handed to the engine per invocation and never
/// cached or written to disk.
pub struct EnvCredentials {
    region_override: Option<String>,
}

impl EnvCredentials {
    /// Create a provider, optionally pinning the region instead of
    /// reading `AWS_DEFAULT_REGION`.
    #[must_use]
    pub fn new(region_override: Option<String>) -> Self {
        Self { region_override }
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentials {
    async fn credentials(&self, _session_id: &str) -> Result<Credentials, DeployError> {
        let access_key_id =
            std::env::var("AWS_ACCESS_KEY_ID").context("AWS_ACCESS_KEY_ID is not set")?;
        let secret_access_key =
            std::env::var("AWS_SECRET_ACCESS_KEY").context("AWS_SECRET_ACCESS_KEY is not set")?;
        let region = match &self.region_override {
            Some(region) => region.clone(),
            None => std::env::var("AWS_DEFAULT_REGION")
                .context("AWS_DEFAULT_REGION is not set and no --region was given")?,
        };
        Ok(Credentials {
            access_key_id,
            secret_access_key,
            region,
        })
    }
}
