//! `fabricctl deploy` — starts a deployment and streams per-device state
//! transitions until it reaches a terminal state.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use fabric_common::types::{Deployment, DeploymentState};
use indicatif::{ProgressBar, ProgressStyle};

use crate::client::FabricClient;
use crate::output::{print_error, print_success, print_warning};

#[derive(Args)]
pub struct DeployArgs {
    /// Intent id returned by `fabricctl build`
    pub intent_id: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

fn is_terminal(state: DeploymentState) -> bool {
    matches!(state, DeploymentState::Verified | DeploymentState::RolledBack)
}

pub async fn execute(args: DeployArgs, mut client: FabricClient) -> Result<()> {
    if !args.yes {
        print_warning(&format!(
            "this will deploy intent '{}' to the fabric. Use --yes to confirm.",
            args.intent_id
        ));
        return Ok(());
    }

    let deployment_id = client.start_deployment(&args.intent_id).await?;
    print_success(&format!("deployment started: {deployment_id}"));

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());

    let mut last_state: HashMap<String, DeploymentState> = HashMap::new();
    loop {
        let raw = client.get_deployment(&deployment_id).await?;
        let deployment: Deployment = serde_json::from_str(&raw)?;

        for (device, state) in &deployment.device_state {
            if last_state.get(device) != Some(state) {
                spinner.println(format!("{device}: {state:?}"));
                last_state.insert(device.clone(), *state);
            }
        }
        spinner.set_message(format!("deployment {deployment_id}: {:?}", deployment.state));
        spinner.tick();

        if is_terminal(deployment.state) {
            spinner.finish_and_clear();
            match deployment.state {
                DeploymentState::Verified => print_success("deployment verified"),
                DeploymentState::RolledBack => {
                    print_error("deployment failed and was rolled back");
                    for (device, detail) in &deployment.errors {
                        print_error(&format!("  {device}: {detail}"));
                    }
                }
                _ => unreachable!(),
            }
            break;
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    Ok(())
}
