//! Deployability classification and configuration repair.

use std::sync::Arc;

use tracing::{debug, info};

use crate::advisor::RemediationAdvisor;
use crate::error::DeployError;
use crate::log_cache::LogCache;
use crate::session::{ConfigDocument, DiagnosisOutcome, SessionState};

/// Tagged result of a repair attempt.
///
/// A plain value rather than an exception keeps the orchestrator's
/// control flow a switch over outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remediation {
    /// A configuration to deploy next. May equal the input when there
    /// was no evidence to act on.
    Fixed(ConfigDocument),
    /// The advisor declined to auto-fix; only the user can supply what
    /// is missing.
    NeedsUserInput,
}

/// Classifies whether a configuration is currently deployable and
/// produces a remediated configuration when it is not.
pub struct Diagnoser {
    remediation: Arc<dyn RemediationAdvisor>,
}

impl Diagnoser {
    /// Create a diagnoser backed by the given remediation capability.
    #[must_use]
    pub fn new(remediation: Arc<dyn RemediationAdvisor>) -> Self {
        Self { remediation }
    }

    /// Classify the session's current configuration.
    #[must_use]
    pub fn determine_deployability(
        &self,
        state: SessionState,
        cache: &LogCache,
    ) -> DiagnosisOutcome {
        match state {
            // A concrete prior failure exists to reason about.
            SessionState::DeploymentFailed if !cache.is_empty() => {
                DiagnosisOutcome::MissingOrInvalidData
            }
            SessionState::DeploymentSucceeded | SessionState::QueriedAndDeployable => {
                DiagnosisOutcome::Deployable
            }
            // No evidence yet; attempt once and see what happens.
            _ => DiagnosisOutcome::Other,
        }
    }

    /// Produce the configuration to deploy next.
    ///
    /// With no failure evidence, or a `Deployable` outcome, this is an
    /// idempotent no-op returning the input unchanged.
    pub async fn fix_broken_config(
        &self,
        outcome: DiagnosisOutcome,
        config: &ConfigDocument,
        cache: &LogCache,
    ) -> Result<Remediation, DeployError> {
        if cache.is_empty() || outcome == DiagnosisOutcome::Deployable {
            debug!(config = %config.name, ?outcome, "no evidence to act on; keeping configuration");
            return Ok(Remediation::Fixed(config.clone()));
        }

        let failure_log = cache.join();
        info!(config = %config.name, ?outcome, entries = cache.len(), "requesting remediation");
        let fixed_body = self.remediation.fix(config, &failure_log).await?;

        if fixed_body.trim().is_empty() {
            info!(config = %config.name, "remediation declined; user input required");
            Ok(Remediation::NeedsUserInput)
        } else {
            Ok(Remediation::Fixed(config.with_body(fixed_body)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::MockRemediationAdvisor;

    fn diagnoser_with(mock: MockRemediationAdvisor) -> Diagnoser {
        Diagnoser::new(Arc::new(mock))
    }

    fn doc() -> ConfigDocument {
        ConfigDocument::new("stack", "resource \"a\" {}")
    }

    #[test]
    fn test_failed_state_with_evidence_is_missing_data() {
        let diagnoser = diagnoser_with(MockRemediationAdvisor::new());
        let mut cache = LogCache::new();
        cache.push("AccessDenied");
        assert_eq!(
            diagnoser.determine_deployability(SessionState::DeploymentFailed, &cache),
            DiagnosisOutcome::MissingOrInvalidData
        );
    }

    #[test]
    fn test_failed_state_without_evidence_is_other() {
        let diagnoser = diagnoser_with(MockRemediationAdvisor::new());
        assert_eq!(
            diagnoser.determine_deployability(SessionState::DeploymentFailed, &LogCache::new()),
            DiagnosisOutcome::Other
        );
    }

    #[test]
    fn test_succeeded_and_deployable_states_are_deployable() {
        let diagnoser = diagnoser_with(MockRemediationAdvisor::new());
        let cache = LogCache::new();
        for state in [
            SessionState::DeploymentSucceeded,
            SessionState::QueriedAndDeployable,
        ] {
            assert_eq!(
                diagnoser.determine_deployability(state, &cache),
                DiagnosisOutcome::Deployable
            );
        }
    }

    #[test]
    fn test_remaining_states_are_other() {
        let diagnoser = diagnoser_with(MockRemediationAdvisor::new());
        let cache = LogCache::new();
        for state in [
            SessionState::NotQueried,
            SessionState::Queried,
            SessionState::QueriedNotDeployable,
            SessionState::DeploymentInProgress,
        ] {
            assert_eq!(
                diagnoser.determine_deployability(state, &cache),
                DiagnosisOutcome::Other
            );
        }
    }

    #[tokio::test]
    async fn test_fix_with_empty_cache_is_identity() {
        // The advisor must not be called at all.
        let mut mock = MockRemediationAdvisor::new();
        mock.expect_fix().never();
        let diagnoser = diagnoser_with(mock);

        let result = diagnoser
            .fix_broken_config(DiagnosisOutcome::MissingOrInvalidData, &doc(), &LogCache::new())
            .await
            .unwrap();
        assert_eq!(result, Remediation::Fixed(doc()));
    }

    #[tokio::test]
    async fn test_fix_with_deployable_outcome_is_identity() {
        let mut mock = MockRemediationAdvisor::new();
        mock.expect_fix().never();
        let diagnoser = diagnoser_with(mock);

        let mut cache = LogCache::new();
        cache.push("stale entry");
        let result = diagnoser
            .fix_broken_config(DiagnosisOutcome::Deployable, &doc(), &cache)
            .await
            .unwrap();
        assert_eq!(result, Remediation::Fixed(doc()));
    }

    #[tokio::test]
    async fn test_fix_wraps_advisor_output_with_same_name() {
        let mut mock = MockRemediationAdvisor::new();
        mock.expect_fix()
            .withf(|config, log| config.name == "stack" && log.contains("AccessDenied"))
            .returning(|_, _| Ok("resource \"a\" { fixed = true }".to_string()));
        let diagnoser = diagnoser_with(mock);

        let mut cache = LogCache::new();
        cache.push("AccessDenied");
        let result = diagnoser
            .fix_broken_config(DiagnosisOutcome::MissingOrInvalidData, &doc(), &cache)
            .await
            .unwrap();
        match result {
            Remediation::Fixed(fixed) => {
                assert_eq!(fixed.name, "stack");
                assert!(fixed.body.contains("fixed = true"));
            }
            Remediation::NeedsUserInput => panic!("expected a fixed configuration"),
        }
    }

    #[tokio::test]
    async fn test_empty_advisor_result_needs_user_input() {
        let mut mock = MockRemediationAdvisor::new();
        mock.expect_fix().returning(|_, _| Ok(String::new()));
        let diagnoser = diagnoser_with(mock);

        let mut cache = LogCache::new();
        cache.push("missing ami id");
        let result = diagnoser
            .fix_broken_config(DiagnosisOutcome::Other, &doc(), &cache)
            .await
            .unwrap();
        assert_eq!(result, Remediation::NeedsUserInput);
    }
}
