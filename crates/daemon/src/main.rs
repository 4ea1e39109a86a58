//! fabricd — the fabric orchestration daemon: runs discovery on a schedule,
//! serves the `FabricControl` gRPC API, and drives deployments to their
//! terminal state.

use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod discovery;
mod grpc;
mod orchestrator;
mod state;

use config::FabricConfig;

#[derive(Parser)]
#[command(name = "fabricd")]
#[command(about = "Fabric orchestration daemon: discovery, consolidation, deployment")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "~/.fabric/config.toml")]
    config: PathBuf,

    /// Store directory (overrides config file)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// gRPC listen address (overrides config file)
    #[arg(short, long)]
    listen: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn resolve_config_path(raw: &std::path::Path) -> PathBuf {
    if let Ok(stripped) = raw.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    raw.to_path_buf()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("fabricd v{}", env!("CARGO_PKG_VERSION"));

    let config_path = resolve_config_path(&cli.config);
    let mut config = FabricConfig::load(&config_path)?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    if let Some(listen) = cli.listen {
        config.grpc_listen = listen;
    }
    config.save(&config_path)?;

    let state = state::StateManager::new(&config).await?;

    let discovery_handle = tokio::spawn(discovery::run_periodic(state.clone()));
    let grpc_handle = tokio::spawn(grpc::serve(config.clone(), state.clone()));

    info!("fabricd started, gRPC listening on {}", config.grpc_listen);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
        result = grpc_handle => {
            if let Err(e) = result {
                tracing::error!("gRPC server task error: {}", e);
            }
        }
        result = discovery_handle => {
            if let Err(e) = result {
                tracing::error!("discovery loop task error: {}", e);
            }
        }
    }

    info!("fabricd shutdown complete");
    Ok(())
}
