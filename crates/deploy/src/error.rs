//! Error taxonomy for the deployment engine.

use thiserror::Error;

/// Errors that can occur while driving a session through provisioning.
#[derive(Error, Debug)]
pub enum DeployError {
    /// The provisioning tool could not initialize its workspace
    /// (bad credentials, network failure, missing providers).
    #[error("workspace init failed: {stderr}")]
    WorkspaceInit { stderr: String },

    /// A provisioning attempt exited non-zero. Recoverable via the
    /// repair loop up to the retry budget.
    #[error("provisioning failed: {stderr}")]
    Provisioning { stderr: String },

    /// Teardown after a failed attempt itself failed. Fatal: resources
    /// may be orphaned and no further automated recovery is attempted.
    #[error("destroy after failed deployment failed: {stderr}")]
    DestroyFailed { stderr: String },

    /// The remediation capability declined to auto-fix; only the user
    /// can supply what is missing.
    #[error("remediation requires additional input from the user")]
    RequiresUserInput,

    /// A programming or persistence invariant was violated.
    #[error("deployment engine invariant violated: {0}")]
    Broken(String),

    /// Filesystem error in the session workspace.
    #[error("workspace I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure in an external adapter (session store, credential
    /// provider, advisor transport).
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
