//! `whatsdeployedd`: the whatsdeployed HTTP service.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};

use whatsdeployed_core::telemetry::init_tracing;
use whatsdeployed_core::{ForgeConfig, GitHubClient, MemoryShortlinkStore, VERSION};
use whatsdeployed_server::{router, AppState};

#[derive(Parser)]
#[command(name = "whatsdeployedd")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serve deployment resolution and culprit attribution over HTTP", long_about = None)]
struct Args {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(args.json, level);

    let config = ForgeConfig::from_env().context("Invalid forge configuration")?;
    let merge_bot_login = config.merge_bot_login.clone();
    let client = Arc::new(GitHubClient::new(config).context("Failed to build GitHub client")?);

    let state = AppState {
        forge: client.clone(),
        markers: client,
        shortlinks: Arc::new(MemoryShortlinkStore::new()),
        merge_bot_login,
    };

    let bind = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!(event = "server.started", bind = %bind, version = VERSION);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
