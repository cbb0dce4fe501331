//! Deployment orchestration engine.
//!
//! Drives a session's IaC configuration through an external
//! provisioning tool, captures bounded failure evidence, asks an
//! injected remediation capability for fixes, retries under a fixed
//! budget, and tears down after every failed attempt so no orphaned
//! cloud resources survive.
//!
//! The intelligence (natural-language extraction, remediation,
//! user-facing guidance) lives behind the [`advisor`] traits; durable
//! session state lives behind [`store::SessionStateStore`]. This crate
//! implements the loop, bounds, and guarantees around those calls.

pub mod advisor;
pub mod diagnose;
pub mod error;
pub mod log_cache;
pub mod orchestrator;
pub mod provision;
pub mod session;
pub mod store;

pub use advisor::{RemediationAdvisor, UsabilityAdvisor};
pub use diagnose::{Diagnoser, Remediation};
pub use error::DeployError;
pub use log_cache::{LogCache, DEFAULT_LOG_LIMIT};
pub use orchestrator::{DeploymentOrchestrator, OrchestratorConfig, DEFAULT_NUM_RETRIES};
pub use provision::{Provisioner, ProvisioningWorkspace, ToolOutput, WorkspaceConfig};
pub use session::{ConfigDocument, Credentials, DiagnosisOutcome, SessionState};
pub use store::{CredentialProvider, SessionStateStore};
