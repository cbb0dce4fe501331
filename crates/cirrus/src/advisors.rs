//! Advisor capability clients.
//!
//! The engine treats remediation and usability messaging as external
//! capabilities. Here they are backed by an HTTP advisor service; when
//! no service is configured the offline advisor defers every fix to
//! the user.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use deploy::{ConfigDocument, DeployError, RemediationAdvisor, UsabilityAdvisor};

#[derive(Serialize)]
struct AdvisorRequest<'a> {
    name: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    failure_log: &'a str,
}

#[derive(Deserialize)]
struct FixResponse {
    /// Corrected configuration body; empty means "no confident fix".
    body: String,
}

#[derive(Deserialize)]
struct MessageResponse {
    message: String,
}

/// JSON client for a remediation/usability advisor service.
pub struct HttpAdvisor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAdvisor {
    /// Create a client for the service at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        request: &AdvisorRequest<'_>,
    ) -> Result<T, DeployError> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(%url, config = request.name, "calling advisor service");
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("advisor service unreachable at {url}"))?
            .error_for_status()
            .with_context(|| format!("advisor service rejected {endpoint}"))?;
        let parsed = response
            .json::<T>()
            .await
            .with_context(|| format!("malformed advisor response from {endpoint}"))?;
        Ok(parsed)
    }
}

#[async_trait]
impl RemediationAdvisor for HttpAdvisor {
    async fn fix(
        &self,
        config: &ConfigDocument,
        failure_log: &str,
    ) -> Result<String, DeployError> {
        let response: FixResponse = self
            .post(
                "fix",
                &AdvisorRequest {
                    name: &config.name,
                    body: &config.body,
                    failure_log,
                },
            )
            .await?;
        Ok(response.body)
    }
}

#[async_trait]
impl UsabilityAdvisor for HttpAdvisor {
    async fn describe_success(&self, config: &ConfigDocument) -> Result<String, DeployError> {
        let response: MessageResponse = self
            .post(
                "describe-success",
                &AdvisorRequest {
                    name: &config.name,
                    body: &config.body,
                    failure_log: "",
                },
            )
            .await?;
        Ok(response.message)
    }

    async fn request_more_info(
        &self,
        config: &ConfigDocument,
        failure_log: &str,
    ) -> Result<String, DeployError> {
        let response: MessageResponse = self
            .post(
                "request-more-info",
                &AdvisorRequest {
                    name: &config.name,
                    body: &config.body,
                    failure_log,
                },
            )
            .await?;
        Ok(response.message)
    }
}

/// Advisor used when no service is configured: never auto-fixes, so
/// every failure asks the user.
pub struct OfflineAdvisor;

#[async_trait]
impl RemediationAdvisor for OfflineAdvisor {
    async fn fix(
        &self,
        _config: &ConfigDocument,
        _failure_log: &str,
    ) -> Result<String, DeployError> {
        Ok(String::new())
    }
}

#[async_trait]
impl UsabilityAdvisor for OfflineAdvisor {
    async fn describe_success(&self, config: &ConfigDocument) -> Result<String, DeployError> {
        Ok(format!(
            "Configuration '{}' deployed successfully.",
            config.name
        ))
    }

    async fn request_more_info(
        &self,
        config: &ConfigDocument,
        failure_log: &str,
    ) -> Result<String, DeployError> {
        let mut message = format!(
            "Deployment of '{}' failed and no advisor service is configured \
             for automatic repair. Review the provisioning output and adjust \
             the configuration.",
            config.name
        );
        if !failure_log.is_empty() {
            message.push_str("\n\nProvisioning output:\n");
            message.push_str(failure_log);
        }
        Ok(message)
    }
}
