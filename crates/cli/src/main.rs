//! fabricctl — operator CLI: a thin driving surface over `fabricd`'s
//! `FabricControl` gRPC API.

use clap::{Parser, Subcommand};

mod client;
mod commands;
mod output;

use client::FabricClient;
use commands::{build, deploy, deployment, discover, services, topology};

#[derive(Parser)]
#[command(name = "fabricctl")]
#[command(author, version, about = "Operator CLI for the fabric bridge-domain orchestrator", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Daemon gRPC address
    #[arg(long, default_value = "http://127.0.0.1:7700", global = true)]
    daemon_addr: String,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger a discovery pass
    Discover(discover::DiscoverArgs),

    /// Inspect the current topology snapshot
    #[command(subcommand)]
    Topology(topology::TopologyCommands),

    /// List or inspect consolidated bridge-domain services
    #[command(subcommand)]
    Services(services::ServiceCommands),

    /// Submit a build intent and preview the computed plan
    Build(build::BuildArgs),

    /// Deploy a previously submitted build intent
    Deploy(deploy::DeployArgs),

    /// Inspect or cancel a deployment
    #[command(subcommand)]
    Deployment(deployment::DeploymentCommands),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let client = FabricClient::connect(&cli.daemon_addr).await;

    match cli.command {
        Commands::Discover(args) => discover::execute(args, client?).await?,
        Commands::Topology(cmd) => topology::execute(cmd, client?, cli.format).await?,
        Commands::Services(cmd) => services::execute(cmd, client?, cli.format).await?,
        Commands::Build(args) => build::execute(args, client?, cli.format).await?,
        Commands::Deploy(args) => deploy::execute(args, client?).await?,
        Commands::Deployment(cmd) => deployment::execute(cmd, client?, cli.format).await?,
    }

    Ok(())
}
