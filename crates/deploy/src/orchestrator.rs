//! The per-session deployment state machine.
//!
//! `trigger_action` advances a session by exactly one externally-visible
//! step: deploy, retry-and-repair under a fixed budget, or respond to
//! the user. Every terminal path persists a well-defined session state
//! and returns a user-facing message, and every failed provisioning
//! attempt tears its resources down before control returns.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::advisor::{RemediationAdvisor, UsabilityAdvisor};
use crate::diagnose::{Diagnoser, Remediation};
use crate::error::DeployError;
use crate::log_cache::{LogCache, DEFAULT_LOG_LIMIT};
use crate::provision::Provisioner;
use crate::session::{ConfigDocument, DiagnosisOutcome, SessionState};
use crate::store::{CredentialProvider, SessionStateStore};

/// Default number of repair-loop iterations per `trigger_action` call.
pub const DEFAULT_NUM_RETRIES: usize = 3;

const MSG_NOT_QUERIED: &str =
    "There's no infrastructure specification for this session yet. \
     Describe what you'd like to deploy and I'll draft a configuration first.";

const MSG_ALREADY_DEPLOYED: &str =
    "This configuration is already deployed. Describe any changes you'd \
     like and I'll update it.";

const MSG_IN_PROGRESS: &str =
    "A deployment is still in progress for this session. Hang tight.";

const MSG_DEPLOY_FAILED: &str =
    "The deployment failed and the partially created resources were torn \
     down. Trigger another deploy to let me attempt a fix, or refine your request.";

const MSG_DEPLOYED_FALLBACK: &str =
    "Your infrastructure was deployed successfully.";

const MSG_NEED_INFO_FALLBACK: &str =
    "I couldn't fix the configuration automatically. Please provide more \
     detail about what you're trying to deploy.";

const MSG_CONTACT_SUPPORT: &str =
    "Something went wrong inside the deployment engine. Please contact support.";

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Repair-loop budget, consumed per `trigger_action` call.
    pub num_retries: usize,
    /// Capacity of each session's failure-evidence buffer.
    pub log_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            num_retries: DEFAULT_NUM_RETRIES,
            log_limit: DEFAULT_LOG_LIMIT,
        }
    }
}

/// Top-level deployment state machine.
pub struct DeploymentOrchestrator {
    config: OrchestratorConfig,
    store: Arc<dyn SessionStateStore>,
    credentials: Arc<dyn CredentialProvider>,
    provisioner: Arc<dyn Provisioner>,
    diagnoser: Diagnoser,
    usability: Arc<dyn UsabilityAdvisor>,
    /// Per-session lock doubling as the owner of that session's
    /// evidence buffer: holding the lock serializes `trigger_action`
    /// re-entry for one session and is the only way to reach its cache.
    sessions: Mutex<HashMap<String, Arc<tokio::sync::Mutex<LogCache>>>>,
}

impl DeploymentOrchestrator {
    /// Wire up the orchestrator with its external capabilities.
    #[must_use]
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn SessionStateStore>,
        credentials: Arc<dyn CredentialProvider>,
        provisioner: Arc<dyn Provisioner>,
        remediation: Arc<dyn RemediationAdvisor>,
        usability: Arc<dyn UsabilityAdvisor>,
    ) -> Self {
        Self {
            config,
            store,
            credentials,
            provisioner,
            diagnoser: Diagnoser::new(remediation),
            usability,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Advance the session by one externally-visible step.
    ///
    /// Returns a user-facing message. `Err` is reserved for session
    /// store and similar infrastructure failures; every deployment
    /// outcome, including fatal ones, comes back as a message with the
    /// session left in a well-defined state.
    pub async fn trigger_action(&self, session_id: &str) -> Result<String, DeployError> {
        let slot = self.session_slot(session_id);
        let mut cache = slot.lock().await;

        let state = self.store.get_state(session_id).await?;
        info!(session_id, %state, "trigger_action");

        match state {
            SessionState::NotQueried => Ok(MSG_NOT_QUERIED.to_string()),
            SessionState::DeploymentSucceeded => Ok(MSG_ALREADY_DEPLOYED.to_string()),
            SessionState::DeploymentInProgress => Ok(MSG_IN_PROGRESS.to_string()),
            SessionState::QueriedAndDeployable => {
                let config = self.store.get_config(session_id).await?;
                match self.deploy_config(session_id, &config, &mut cache).await {
                    Ok(true) => Ok(self.success_message(&config).await),
                    Ok(false) => Ok(MSG_DEPLOY_FAILED.to_string()),
                    Err(err) => {
                        self.recover_from_error(session_id, &config, &mut cache, err)
                            .await
                    }
                }
            }
            SessionState::Queried
            | SessionState::QueriedNotDeployable
            | SessionState::DeploymentFailed => {
                let config = self.store.get_config(session_id).await?;
                let outcome = self.diagnoser.determine_deployability(state, &cache);
                self.handle_failed_deployment(session_id, outcome, config, &mut cache)
                    .await
            }
        }
    }

    /// One provisioning attempt: persist `DeploymentInProgress`, init,
    /// write the configuration, apply.
    ///
    /// Returns `Ok(true)` on success and `Ok(false)` on a failed apply.
    /// A failed apply always runs `destroy` before returning so no
    /// orphaned resources survive the attempt; a failed destroy is
    /// fatal ([`DeployError::DestroyFailed`]).
    async fn deploy_config(
        &self,
        session_id: &str,
        config: &ConfigDocument,
        cache: &mut LogCache,
    ) -> Result<bool, DeployError> {
        self.store
            .set_state(session_id, SessionState::DeploymentInProgress)
            .await?;

        let credentials = self.credentials.credentials(session_id).await?;
        self.provisioner.init(session_id, &credentials).await?;
        self.provisioner.write_config(session_id, config).await?;

        let output = self.provisioner.apply(session_id, &credentials).await?;
        if output.success() {
            self.store
                .set_state(session_id, SessionState::DeploymentSucceeded)
                .await?;
            info!(session_id, config = %config.name, "deployment succeeded");
            return Ok(true);
        }

        warn!(
            session_id,
            config = %config.name,
            exit_code = output.exit_code,
            "apply failed"
        );
        cache.push(output.stderr);
        self.store
            .set_state(session_id, SessionState::DeploymentFailed)
            .await?;

        let destroy = self.provisioner.destroy(session_id, &credentials).await?;
        if destroy.success() {
            info!(session_id, "failed attempt torn down");
            Ok(false)
        } else {
            error!(session_id, exit_code = destroy.exit_code, "destroy failed");
            cache.push(destroy.stderr.clone());
            Err(DeployError::DestroyFailed {
                stderr: destroy.stderr,
            })
        }
    }

    /// The bounded repair loop: diagnose, remediate, redeploy.
    async fn handle_failed_deployment(
        &self,
        session_id: &str,
        mut outcome: DiagnosisOutcome,
        mut current: ConfigDocument,
        cache: &mut LogCache,
    ) -> Result<String, DeployError> {
        for attempt in 1..=self.config.num_retries {
            debug!(session_id, attempt, ?outcome, "repair loop iteration");

            let remediation = match self
                .diagnoser
                .fix_broken_config(outcome, &current, cache)
                .await
            {
                Ok(remediation) => remediation,
                Err(err) => {
                    // Fail-safe: an unreachable or erroring advisor stops
                    // the loop and asks the user instead of spinning.
                    warn!(session_id, %err, "remediation errored; asking the user");
                    return self.give_up(session_id, &current, cache).await;
                }
            };

            let new_config = match remediation {
                Remediation::Fixed(config) => config,
                Remediation::NeedsUserInput => {
                    return self.give_up(session_id, &current, cache).await;
                }
            };

            match self.deploy_config(session_id, &new_config, cache).await {
                Ok(true) => {
                    cache.clear();
                    self.store.set_config(session_id, &new_config).await?;
                    return Ok(self.success_message(&new_config).await);
                }
                Ok(false) => {
                    outcome = self
                        .diagnoser
                        .determine_deployability(SessionState::DeploymentFailed, cache);
                    current = new_config;
                }
                Err(err) => {
                    return self
                        .recover_from_error(session_id, &new_config, cache, err)
                        .await;
                }
            }
        }

        info!(
            session_id,
            budget = self.config.num_retries,
            "retry budget exhausted"
        );
        self.give_up(session_id, &current, cache).await
    }

    /// Terminal "need more information" path: build the message from
    /// the evidence, then clear it and park the session.
    async fn give_up(
        &self,
        session_id: &str,
        config: &ConfigDocument,
        cache: &mut LogCache,
    ) -> Result<String, DeployError> {
        let failure_log = cache.join();
        let message = match self.usability.request_more_info(config, &failure_log).await {
            Ok(message) => message,
            Err(err) => {
                warn!(session_id, %err, "usability advisor unavailable");
                MSG_NEED_INFO_FALLBACK.to_string()
            }
        };
        cache.clear();
        self.store
            .set_state(session_id, SessionState::QueriedNotDeployable)
            .await?;
        Ok(message)
    }

    /// Map a non-store error onto a terminal message and state.
    async fn recover_from_error(
        &self,
        session_id: &str,
        config: &ConfigDocument,
        cache: &mut LogCache,
        err: DeployError,
    ) -> Result<String, DeployError> {
        match err {
            err @ DeployError::Store(_) => Err(err),
            DeployError::WorkspaceInit { stderr } => {
                warn!(session_id, "workspace init failed: {stderr}");
                self.store
                    .set_state(session_id, SessionState::QueriedNotDeployable)
                    .await?;
                Ok(format!(
                    "I couldn't initialize the provisioning workspace, which \
                     usually means cloud credentials are missing or invalid. \
                     Details:\n{stderr}"
                ))
            }
            DeployError::DestroyFailed { stderr } => {
                // Resources may be orphaned; nothing automated left to try.
                error!(session_id, "destroy failed after deployment failure");
                Ok(format!(
                    "The deployment failed and cleanup of its resources also \
                     failed, so some resources may still exist in your \
                     account. Please contact support. Details:\n{stderr}"
                ))
            }
            DeployError::Broken(detail) => {
                error!(session_id, detail = %detail, "engine invariant violated");
                Ok(MSG_CONTACT_SUPPORT.to_string())
            }
            err => {
                warn!(session_id, %err, "unclassified failure; asking the user");
                self.give_up(session_id, config, cache).await
            }
        }
    }

    async fn success_message(&self, config: &ConfigDocument) -> String {
        match self.usability.describe_success(config).await {
            Ok(message) => message,
            Err(err) => {
                warn!(config = %config.name, %err, "usability advisor unavailable");
                MSG_DEPLOYED_FALLBACK.to_string()
            }
        }
    }

    /// Fetch or create the session's lock-plus-cache slot.
    fn session_slot(&self, session_id: &str) -> Arc<tokio::sync::Mutex<LogCache>> {
        let mut sessions = self.sessions.lock().expect("session index poisoned");
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(LogCache::with_capacity(
                    self.config.log_limit,
                )))
            })
            .clone()
    }
}
