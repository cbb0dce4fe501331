//! Session and configuration value types.

use serde::{Deserialize, Serialize};

use crate::error::DeployError;

/// An immutable IaC configuration document.
///
/// Any edit or repair produces a new document; the session's current
/// document is replaced, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDocument {
    /// Identifier the document is stored and provisioned under.
    pub name: String,
    /// Opaque IaC source text consumed by the provisioning tool.
    pub body: String,
}

impl ConfigDocument {
    /// Create a new document.
    #[must_use]
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }

    /// Derive a successor document carrying the same name.
    #[must_use]
    pub fn with_body(&self, body: impl Into<String>) -> Self {
        Self {
            name: self.name.clone(),
            body: body.into(),
        }
    }
}

/// Lifecycle state of a deployment session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No infrastructure specification has been captured yet.
    NotQueried,
    /// A specification exists but has not been assessed for deployment.
    Queried,
    /// The current configuration is known to need more work.
    QueriedNotDeployable,
    /// The current configuration is ready to deploy as-is.
    QueriedAndDeployable,
    /// A provisioning attempt is running.
    DeploymentInProgress,
    /// The most recent provisioning attempt succeeded.
    DeploymentSucceeded,
    /// The most recent provisioning attempt failed.
    DeploymentFailed,
}

impl SessionState {
    /// Decode a persisted state string.
    ///
    /// The store round-trips states as strings; an out-of-domain value
    /// means the persisted row is corrupt, which is fatal rather than
    /// something the repair loop should guess about.
    pub fn decode(raw: &str) -> Result<Self, DeployError> {
        match raw {
            "not_queried" => Ok(Self::NotQueried),
            "queried" => Ok(Self::Queried),
            "queried_not_deployable" => Ok(Self::QueriedNotDeployable),
            "queried_and_deployable" => Ok(Self::QueriedAndDeployable),
            "deployment_in_progress" => Ok(Self::DeploymentInProgress),
            "deployment_succeeded" => Ok(Self::DeploymentSucceeded),
            "deployment_failed" => Ok(Self::DeploymentFailed),
            other => Err(DeployError::Broken(format!(
                "unknown persisted session state: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotQueried => write!(f, "not_queried"),
            Self::Queried => write!(f, "queried"),
            Self::QueriedNotDeployable => write!(f, "queried_not_deployable"),
            Self::QueriedAndDeployable => write!(f, "queried_and_deployable"),
            Self::DeploymentInProgress => write!(f, "deployment_in_progress"),
            Self::DeploymentSucceeded => write!(f, "deployment_succeeded"),
            Self::DeploymentFailed => write!(f, "deployment_failed"),
        }
    }
}

/// Result of classifying whether the current configuration should be
/// attempted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosisOutcome {
    /// Deploy the current configuration without modification.
    Deployable,
    /// A concrete prior failure exists to reason about.
    MissingOrInvalidData,
    /// No evidence yet; attempt once and see what happens.
    Other,
}

/// Per-invocation cloud credentials.
///
/// Passed as explicit environment overrides to the single subprocess
/// call, never written into shared files or process-global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_body_keeps_name() {
        let doc = ConfigDocument::new("load-test", "resource \"a\" {}");
        let fixed = doc.with_body("resource \"b\" {}");
        assert_eq!(fixed.name, "load-test");
        assert_eq!(fixed.body, "resource \"b\" {}");
        assert_eq!(doc.body, "resource \"a\" {}");
    }

    #[test]
    fn test_state_display_decode_round_trip() {
        let states = [
            SessionState::NotQueried,
            SessionState::Queried,
            SessionState::QueriedNotDeployable,
            SessionState::QueriedAndDeployable,
            SessionState::DeploymentInProgress,
            SessionState::DeploymentSucceeded,
            SessionState::DeploymentFailed,
        ];
        for state in states {
            assert_eq!(SessionState::decode(&state.to_string()).unwrap(), state);
        }
    }

    #[test]
    fn test_state_decode_rejects_unknown() {
        assert!(SessionState::decode("deploying_sideways").is_err());
    }
}
