//! `fabricctl deployment show|cancel` — inspects or cancels a deployment
//! already in flight.

use anyhow::Result;
use clap::Subcommand;

use crate::client::FabricClient;
use crate::output::{print_json_blob, print_success, print_warning, OutputFormat};

#[derive(Subcommand)]
pub enum DeploymentCommands {
    /// Show a deployment's current state
    Show {
        /// Deployment id
        id: String,
    },
    /// Cancel an in-flight deployment
    Cancel {
        /// Deployment id
        id: String,
    },
}

pub async fn execute(cmd: DeploymentCommands, mut client: FabricClient, format: OutputFormat) -> Result<()> {
    match cmd {
        DeploymentCommands::Show { id } => {
            let raw = client.get_deployment(&id).await?;
            print_json_blob(&raw, format);
        }
        DeploymentCommands::Cancel { id } => {
            let cancelled = client.cancel_deployment(&id).await?;
            if cancelled {
                print_success(&format!("cancellation requested for {id}"));
            } else {
                print_warning(&format!("deployment {id} is not currently running"));
            }
        }
    }
    Ok(())
}
