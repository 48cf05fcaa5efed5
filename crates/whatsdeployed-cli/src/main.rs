//! whatsdeployed CLI
//!
//! One-shot access to the pipeline from a terminal.
//!
//! ## Commands
//!
//! - `resolve`: fetch each environment's version marker and print revisions
//!   plus the repository's tag index
//! - `culprits`: print who is behind each deployed revision
//!
//! Results go to stdout as JSON; logs go to stderr.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::Level;

use whatsdeployed_core::telemetry::init_tracing;
use whatsdeployed_core::{
    attribute, resolve, DeployedRevision, EnvironmentSpec, ForgeConfig, GitHubClient, RepoRef,
};

#[derive(Parser)]
#[command(name = "whatsdeployed")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "What's deployed where, and who put it there", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// GitHub token (falls back to GITHUB_AUTH_TOKEN)
    #[arg(long, global = true, env = "GITHUB_AUTH_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the revision running in each environment
    Resolve {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        repo: String,

        /// Environment as `name=version-marker-url` (repeatable, order kept)
        #[arg(long = "env", value_name = "NAME=URL", value_parser = parse_pair, required = true)]
        envs: Vec<(String, String)>,
    },

    /// Attribute the people behind deployed revisions
    Culprits {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        repo: String,

        /// Deployment as `name=revision` (repeatable, order kept)
        #[arg(long = "env", value_name = "NAME=REVISION", value_parser = parse_pair, required = true)]
        envs: Vec<(String, String)>,
    },
}

/// Split `name=value` on the first `=`.
fn parse_pair(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("empty name in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    init_tracing(cli.json, level);

    let mut config = ForgeConfig::from_env().context("Invalid forge configuration")?;
    if let Some(token) = cli.token.as_deref().filter(|t| !t.trim().is_empty()) {
        config = config.with_token(token.trim());
    }
    let merge_bot_login = config.merge_bot_login.clone();
    let client = GitHubClient::new(config).context("Failed to build GitHub client")?;

    match cli.command {
        Commands::Resolve { owner, repo, envs } => {
            let repo = RepoRef::new(owner, repo);
            let envs: Vec<EnvironmentSpec> = envs
                .into_iter()
                .map(|(name, url)| EnvironmentSpec::new(name, url))
                .collect();
            let resolution = resolve(&client, &client, &repo, &envs)
                .await
                .with_context(|| format!("Failed to resolve deployments of {repo}"))?;
            print_json(&resolution)?;
        }
        Commands::Culprits { owner, repo, envs } => {
            let repo = RepoRef::new(owner, repo);
            let deployments: Vec<DeployedRevision> = envs
                .into_iter()
                .map(|(name, revision)| DeployedRevision::new(name, revision))
                .collect();
            let groups = attribute(&client, &repo, &deployments, &merge_bot_login)
                .await
                .with_context(|| format!("Failed to attribute culprits in {repo}"))?;
            print_json(&groups)?;
        }
    }

    Ok(())
}
