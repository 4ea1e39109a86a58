//! `fabricctl build` — submits a `BuildIntent` and previews the computed
//! per-device configuration plan without deploying it.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::client::FabricClient;
use crate::output::{print_json_blob, print_success, OutputFormat};

#[derive(Args)]
pub struct BuildArgs {
    /// Path to a JSON-encoded BuildIntent
    pub intent_file: PathBuf,
}

pub async fn execute(args: BuildArgs, mut client: FabricClient, format: OutputFormat) -> Result<()> {
    let intent_json = std::fs::read_to_string(&args.intent_file)
        .with_context(|| format!("reading {}", args.intent_file.display()))?;

    let (intent_id, plan_json) = client.submit_build_intent(intent_json).await?;
    print_success(&format!("intent accepted: {intent_id}"));
    println!("deploy with: fabricctl deploy {intent_id}");
    print_json_blob(&plan_json, format);
    Ok(())
}
