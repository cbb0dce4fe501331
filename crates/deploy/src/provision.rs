//! Wrapper around the external provisioning tool.
//!
//! One isolated workspace directory per session. The tool is treated as
//! an opaque process with an exit-code/stderr contract: non-zero exit
//! means failure and stderr is the only diagnostic fed forward.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::DeployError;
use crate::session::{ConfigDocument, Credentials};

/// Captured result of one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit code; non-zero indicates failure.
    pub exit_code: i32,
    /// Captured standard error.
    pub stderr: String,
}

impl ToolOutput {
    /// Whether the invocation succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Blocking operations against a session's provisioning workspace.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create or reuse the session's workspace and install provider
    /// plugins. Fails with [`DeployError::WorkspaceInit`] if the tool
    /// cannot initialize (bad credentials, network failure).
    async fn init(&self, session_id: &str, credentials: &Credentials) -> Result<(), DeployError>;

    /// Persist the configuration into the workspace under a file named
    /// after the document.
    async fn write_config(
        &self,
        session_id: &str,
        config: &ConfigDocument,
    ) -> Result<(), DeployError>;

    /// Apply the current configuration without interactive approval.
    /// Side effect: mutates real cloud resources.
    async fn apply(
        &self,
        session_id: &str,
        credentials: &Credentials,
    ) -> Result<ToolOutput, DeployError>;

    /// Tear down all resources created by the workspace.
    async fn destroy(
        &self,
        session_id: &str,
        credentials: &Credentials,
    ) -> Result<ToolOutput, DeployError>;
}

/// Configuration for [`ProvisioningWorkspace`].
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Directory under which per-session workspaces are created.
    pub root: PathBuf,
    /// Provisioning tool binary.
    pub tool_bin: String,
    /// Optional wall-clock limit per tool invocation. On elapse the
    /// child is killed and the invocation reports a failed output.
    pub timeout: Option<Duration>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("workspaces"),
            tool_bin: "terraform".to_string(),
            timeout: None,
        }
    }
}

/// Shells out to the provisioning tool with per-session isolation and
/// per-invocation credential env overrides.
pub struct ProvisioningWorkspace {
    config: WorkspaceConfig,
}

impl ProvisioningWorkspace {
    /// Create a workspace manager.
    #[must_use]
    pub fn new(config: WorkspaceConfig) -> Self {
        Self { config }
    }

    /// Directory holding the session's tool state and configuration.
    #[must_use]
    pub fn workspace_dir(&self, session_id: &str) -> PathBuf {
        self.config.root.join(session_id)
    }

    async fn ensure_dir(&self, session_id: &str) -> Result<PathBuf, DeployError> {
        validate_identifier(session_id)?;
        let dir = self.workspace_dir(session_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Run the tool with the given args, blocking until it exits or the
    /// configured timeout elapses.
    async fn run_tool(
        &self,
        dir: &Path,
        credentials: &Credentials,
        args: &[&str],
    ) -> Result<ToolOutput, DeployError> {
        debug!(tool = %self.config.tool_bin, ?args, dir = %dir.display(), "invoking provisioning tool");

        let mut child = Command::new(&self.config.tool_bin)
            .args(args)
            .current_dir(dir)
            .env("AWS_ACCESS_KEY_ID", &credentials.access_key_id)
            .env("AWS_SECRET_ACCESS_KEY", &credentials.secret_access_key)
            .env("AWS_DEFAULT_REGION", &credentials.region)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain stderr concurrently so a chatty tool never deadlocks on
        // a full pipe.
        let stderr_pipe = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_string(&mut buf).await;
            }
            buf
        });

        let status = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(
                        tool = %self.config.tool_bin,
                        timeout_secs = limit.as_secs_f64(),
                        "provisioning tool timed out; killing child"
                    );
                    let _ = child.kill().await;
                    let partial = stderr_task.await.unwrap_or_default();
                    return Ok(ToolOutput {
                        exit_code: -1,
                        stderr: format!(
                            "{} {} timed out after {:.1}s and was killed\n{partial}",
                            self.config.tool_bin,
                            args.first().unwrap_or(&""),
                            limit.as_secs_f64()
                        ),
                    });
                }
            },
            None => child.wait().await?,
        };

        let stderr = stderr_task.await.unwrap_or_default();
        Ok(ToolOutput {
            exit_code: status.code().unwrap_or(-1),
            stderr,
        })
    }
}

#[async_trait]
impl Provisioner for ProvisioningWorkspace {
    async fn init(&self, session_id: &str, credentials: &Credentials) -> Result<(), DeployError> {
        let dir = self.ensure_dir(session_id).await?;
        let output = self
            .run_tool(&dir, credentials, &["init", "-input=false", "-no-color"])
            .await?;
        if output.success() {
            info!(session_id, "workspace initialized");
            Ok(())
        } else {
            Err(DeployError::WorkspaceInit {
                stderr: output.stderr,
            })
        }
    }

    async fn write_config(
        &self,
        session_id: &str,
        config: &ConfigDocument,
    ) -> Result<(), DeployError> {
        validate_identifier(&config.name)?;
        let dir = self.ensure_dir(session_id).await?;
        let path = dir.join(format!("{}.tf", config.name));
        tokio::fs::write(&path, &config.body).await?;
        debug!(session_id, path = %path.display(), "configuration written");
        Ok(())
    }

    async fn apply(
        &self,
        session_id: &str,
        credentials: &Credentials,
    ) -> Result<ToolOutput, DeployError> {
        let dir = self.ensure_dir(session_id).await?;
        let output = self
            .run_tool(
                &dir,
                credentials,
                &["apply", "-auto-approve", "-input=false", "-no-color"],
            )
            .await?;
        info!(session_id, exit_code = output.exit_code, "apply finished");
        Ok(output)
    }

    async fn destroy(
        &self,
        session_id: &str,
        credentials: &Credentials,
    ) -> Result<ToolOutput, DeployError> {
        let dir = self.ensure_dir(session_id).await?;
        let output = self
            .run_tool(
                &dir,
                credentials,
                &["destroy", "-auto-approve", "-input=false", "-no-color"],
            )
            .await?;
        info!(session_id, exit_code = output.exit_code, "destroy finished");
        Ok(output)
    }
}

/// Session ids and document names become path components; reject
/// anything that could escape the workspace root.
fn validate_identifier(id: &str) -> Result<(), DeployError> {
    if id.is_empty()
        || id == "."
        || id == ".."
        || id.contains('/')
        || id.contains('\\')
        || id.contains('\0')
    {
        return Err(DeployError::Broken(format!(
            "identifier is not a safe path component: {id:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn creds() -> Credentials {
        Credentials {
            access_key_id: "AKIATEST".to_string(),
            secret_access_key: "secret".to_string(),
            region: "us-east-1".to_string(),
        }
    }

    /// Write an executable fake tool script and return a workspace
    /// manager pointing at it.
    fn fake_tool(dir: &tempfile::TempDir, script: &str) -> ProvisioningWorkspace {
        let tool = dir.path().join("fake-tool");
        let mut file = std::fs::File::create(&tool).unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        writeln!(file, "{script}").unwrap();
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        ProvisioningWorkspace::new(WorkspaceConfig {
            root: dir.path().join("workspaces"),
            tool_bin: tool.to_string_lossy().into_owned(),
            timeout: None,
        })
    }

    #[tokio::test]
    async fn test_apply_captures_exit_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let ws = fake_tool(&dir, "echo 'AccessDenied' >&2; exit 1");

        let output = ws.apply("sess-1", &creds()).await.unwrap();
        assert_eq!(output.exit_code, 1);
        assert!(!output.success());
        assert!(output.stderr.contains("AccessDenied"));
    }

    #[tokio::test]
    async fn test_credentials_are_injected_per_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let ws = fake_tool(&dir, "echo \"key=$AWS_ACCESS_KEY_ID region=$AWS_DEFAULT_REGION\" >&2; exit 0");

        let output = ws.apply("sess-1", &creds()).await.unwrap();
        assert!(output.success());
        assert!(output.stderr.contains("key=AKIATEST"));
        assert!(output.stderr.contains("region=us-east-1"));
    }

    #[tokio::test]
    async fn test_init_failure_is_workspace_init_error() {
        let dir = tempfile::tempdir().unwrap();
        let ws = fake_tool(&dir, "echo 'no valid credential sources' >&2; exit 1");

        let err = ws.init("sess-1", &creds()).await.unwrap_err();
        match err {
            DeployError::WorkspaceInit { stderr } => {
                assert!(stderr.contains("no valid credential sources"));
            }
            other => panic!("expected WorkspaceInit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_config_uses_document_name() {
        let dir = tempfile::tempdir().unwrap();
        let ws = fake_tool(&dir, "exit 0");

        let doc = ConfigDocument::new("load-test", "resource \"x\" {}");
        ws.write_config("sess-1", &doc).await.unwrap();

        let written =
            std::fs::read_to_string(ws.workspace_dir("sess-1").join("load-test.tf")).unwrap();
        assert_eq!(written, "resource \"x\" {}");
    }

    #[tokio::test]
    async fn test_timeout_kills_child_and_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = fake_tool(&dir, "sleep 10; exit 0");
        ws.config.timeout = Some(Duration::from_millis(200));

        let output = ws.apply("sess-1", &creds()).await.unwrap();
        assert!(!output.success());
        assert!(output.stderr.contains("timed out"));
    }

    #[tokio::test]
    async fn test_unsafe_session_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ws = fake_tool(&dir, "exit 0");

        let err = ws.apply("../escape", &creds()).await.unwrap_err();
        assert!(matches!(err, DeployError::Broken(_)));
    }
}
