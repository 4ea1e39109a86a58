//! `fabricctl discover` — triggers a discovery pass against named devices
//! (or the whole inventory) and reports the resulting topology summary.

use anyhow::Result;
use clap::Args;

use crate::client::FabricClient;
use crate::output::print_success;

#[derive(Args)]
pub struct DiscoverArgs {
    /// Limit discovery to these devices (default: all known devices)
    #[arg(long = "device")]
    pub devices: Vec<String>,
}

pub async fn execute(args: DiscoverArgs, mut client: FabricClient) -> Result<()> {
    let (snapshot_id, fragment_count, anomaly_count) = client.trigger_discovery(args.devices).await?;
    print_success(&format!(
        "discovery complete: snapshot {snapshot_id}, {fragment_count} fragments, {anomaly_count} anomalies"
    ));
    Ok(())
}
