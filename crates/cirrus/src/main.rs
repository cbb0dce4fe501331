//! Cirrus operator CLI.
//!
//! Wires the deployment engine to a JSON-file session store, an
//! environment credential provider, the real provisioning tool, and an
//! optional HTTP advisor service, then drives sessions one
//! `trigger_action` step at a time.

mod advisors;
mod credentials;
mod store;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use deploy::{
    ConfigDocument, DeploymentOrchestrator, OrchestratorConfig, Provisioner,
    ProvisioningWorkspace, RemediationAdvisor, SessionState, SessionStateStore, UsabilityAdvisor,
    WorkspaceConfig, DEFAULT_NUM_RETRIES,
};

use advisors::{HttpAdvisor, OfflineAdvisor};
use credentials::EnvCredentials;
use store::JsonFileStore;

/// Deploy and repair IaC configurations against a cloud account
#[derive(Parser)]
#[command(name = "cirrus")]
#[command(about = "Deploy and repair IaC configurations against a cloud account")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding per-session state files
    #[arg(long, default_value = "sessions", global = true)]
    state_dir: PathBuf,

    /// Directory holding per-session provisioning workspaces
    #[arg(long, default_value = "workspaces", global = true)]
    workspace_root: PathBuf,

    /// Provisioning tool binary
    #[arg(long, default_value = "terraform", global = true)]
    tool: String,

    /// Wall-clock limit in seconds per tool invocation
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Base URL of the remediation/usability advisor service
    #[arg(long, env = "CIRRUS_ADVISOR_URL", global = true)]
    advisor_url: Option<String>,

    /// Cloud region override (otherwise AWS_DEFAULT_REGION)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a configuration document for a session and mark it queried
    Seed {
        /// Session identifier
        #[arg(long)]
        session: String,

        /// Configuration name (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,

        /// File containing the IaC configuration
        #[arg(long)]
        file: PathBuf,
    },
    /// Advance a session one step: deploy, repair, or ask for more info
    Trigger {
        /// Session identifier
        #[arg(long)]
        session: String,

        /// Repair-loop budget for this invocation
        #[arg(long, default_value_t = DEFAULT_NUM_RETRIES)]
        retries: usize,
    },
    /// Show a session's state and configuration
    Status {
        /// Session identifier
        #[arg(long)]
        session: String,
    },
    /// List known sessions
    Sessions,
    /// Tear down a session's provisioned resources
    Destroy {
        /// Session identifier
        #[arg(long)]
        session: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("cirrus=debug,deploy=debug")
            .init();
    }

    match &cli.command {
        Commands::Seed {
            session,
            name,
            file,
        } => seed(&cli, session, name.as_deref(), file).await,
        Commands::Trigger { session, retries } => trigger(&cli, session, *retries).await,
        Commands::Status { session } => status(&cli, session).await,
        Commands::Sessions => sessions(&cli),
        Commands::Destroy { session } => destroy(&cli, session).await,
    }
}

fn provisioner(cli: &Cli) -> ProvisioningWorkspace {
    ProvisioningWorkspace::new(WorkspaceConfig {
        root: cli.workspace_root.clone(),
        tool_bin: cli.tool.clone(),
        timeout: cli.timeout_secs.map(Duration::from_secs),
    })
}

fn advisor_pair(cli: &Cli) -> (Arc<dyn RemediationAdvisor>, Arc<dyn UsabilityAdvisor>) {
    match &cli.advisor_url {
        Some(url) => {
            let advisor = Arc::new(HttpAdvisor::new(url.clone()));
            (advisor.clone(), advisor)
        }
        None => (Arc::new(OfflineAdvisor), Arc::new(OfflineAdvisor)),
    }
}

async fn seed(cli: &Cli, session: &str, name: Option<&str>, file: &Path) -> Result<()> {
    let body = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let name = match name {
        Some(name) => name.to_string(),
        None => file
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("stack")
            .to_string(),
    };

    let store = JsonFileStore::new(&cli.state_dir);
    let config = ConfigDocument::new(name, body);
    store.set_config(session, &config).await?;
    store.set_state(session, SessionState::Queried).await?;

    println!(
        "{} session '{}' seeded with configuration '{}'",
        "ok:".green().bold(),
        session,
        config.name
    );
    Ok(())
}

async fn trigger(cli: &Cli, session: &str, retries: usize) -> Result<()> {
    let (remediation, usability) = advisor_pair(cli);
    let orchestrator = DeploymentOrchestrator::new(
        OrchestratorConfig {
            num_retries: retries,
            ..Default::default()
        },
        Arc::new(JsonFileStore::new(&cli.state_dir)),
        Arc::new(EnvCredentials::new(cli.region.clone())),
        Arc::new(provisioner(cli)),
        remediation,
        usability,
    );

    let message = orchestrator.trigger_action(session).await?;
    println!("{message}");
    Ok(())
}

async fn status(cli: &Cli, session: &str) -> Result<()> {
    let store = JsonFileStore::new(&cli.state_dir);
    let state = store.get_state(session).await?;

    let rendered = match state {
        SessionState::DeploymentSucceeded => state.to_string().green().bold(),
        SessionState::DeploymentFailed => state.to_string().red().bold(),
        SessionState::DeploymentInProgress => state.to_string().yellow().bold(),
        _ => state.to_string().normal(),
    };
    println!("session:  {session}");
    println!("state:    {rendered}");

    match store.get_config(session).await {
        Ok(config) => println!("config:   {} ({} bytes)", config.name, config.body.len()),
        Err(_) => println!("config:   {}", "none".dimmed()),
    }
    Ok(())
}

fn sessions(cli: &Cli) -> Result<()> {
    let sessions = store::list_sessions(&cli.state_dir)?;
    if sessions.is_empty() {
        println!("{}", "no sessions".dimmed());
        return Ok(());
    }
    for session in sessions {
        println!("{session}");
    }
    Ok(())
}

async fn destroy(cli: &Cli, session: &str) -> Result<()> {
    use deploy::CredentialProvider;

    let credentials = EnvCredentials::new(cli.region.clone())
        .credentials(session)
        .await?;
    let output = provisioner(cli).destroy(session, &credentials).await?;

    if output.success() {
        println!("{} workspace for '{}' destroyed", "ok:".green().bold(), session);
        Ok(())
    } else {
        anyhow::bail!(
            "destroy failed with exit code {}:\n{}",
            output.exit_code,
            output.stderr
        );
    }
}
