//! External "intelligence" capabilities.
//!
//! The engine implements the loop, bounds, and guarantees around these
//! calls, not the intelligence itself. Both capabilities are injected
//! so the state machine is testable with deterministic stubs.

use async_trait::async_trait;

use crate::error::DeployError;
use crate::session::ConfigDocument;

/// Produces a corrected configuration from a broken one plus failure
/// evidence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemediationAdvisor: Send + Sync {
    /// Attempt to fix `config` given the joined failure log.
    ///
    /// Returns the corrected configuration body. An empty string means
    /// "no confident fix; needs information only the user has".
    async fn fix(&self, config: &ConfigDocument, failure_log: &str)
        -> Result<String, DeployError>;
}

/// Produces user-facing guidance around deployment outcomes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsabilityAdvisor: Send + Sync {
    /// Describe a successfully deployed configuration and how to use it.
    async fn describe_success(&self, config: &ConfigDocument) -> Result<String, DeployError>;

    /// Ask the user for the information automatic repair could not
    /// supply, given the failure evidence.
    async fn request_more_info(
        &self,
        config: &ConfigDocument,
        failure_log: &str,
    ) -> Result<String, DeployError>;
}
