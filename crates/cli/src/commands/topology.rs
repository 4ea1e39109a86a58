//! `fabricctl topology show` — dumps the current published topology.

use anyhow::Result;
use clap::Subcommand;

use crate::client::FabricClient;
use crate::output::{print_json_blob, OutputFormat};

#[derive(Subcommand)]
pub enum TopologyCommands {
    /// Show the current topology snapshot
    Show,
}

pub async fn execute(cmd: TopologyCommands, mut client: FabricClient, format: OutputFormat) -> Result<()> {
    match cmd {
        TopologyCommands::Show => {
            let (snapshot_id, topology_json) = client.get_topology().await?;
            println!("snapshot {snapshot_id}:");
            print_json_blob(&topology_json, format);
        }
    }
    Ok(())
}
