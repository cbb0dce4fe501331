//! External persistence and credential capabilities.
//!
//! Durable session state lives outside this crate. The orchestrator
//! re-reads it at the start of every invocation and never treats its
//! in-memory copy as authoritative across invocations.

use async_trait::async_trait;

use crate::error::DeployError;
use crate::session::{ConfigDocument, Credentials, SessionState};

/// Durable store for session lifecycle state and the current
/// configuration document.
///
/// Read-your-writes consistency is assumed within one orchestrator
/// invocation; nothing transactional is assumed across invocations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStateStore: Send + Sync {
    /// Fetch the session's lifecycle state.
    async fn get_state(&self, session_id: &str) -> Result<SessionState, DeployError>;

    /// Persist the session's lifecycle state.
    async fn set_state(&self, session_id: &str, state: SessionState) -> Result<(), DeployError>;

    /// Fetch the session's current configuration document.
    async fn get_config(&self, session_id: &str) -> Result<ConfigDocument, DeployError>;

    /// Replace the session's current configuration document.
    async fn set_config(
        &self,
        session_id: &str,
        config: &ConfigDocument,
    ) -> Result<(), DeployError>;
}

/// Source of per-invocation cloud credentials.
///
/// Credentials are handed to exactly one subprocess invocation as
/// environment overrides and are never cached by the engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Resolve credentials for the session's cloud account.
    async fn credentials(&self, session_id: &str) -> Result<Credentials, DeployError>;
}
