//! `fabricctl services list|show` — inspects consolidated
//! `BridgeDomainService` records.

use anyhow::Result;
use clap::Subcommand;
use fabric_common::types::BridgeDomainService;
use serde::Serialize;

use crate::client::FabricClient;
use crate::output::{print_item, print_list, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum ServiceCommands {
    /// List consolidated bridge-domain services
    List,
    /// Show one service by name
    Show {
        /// Service name
        name: String,
    },
}

#[derive(Serialize)]
pub struct ServiceDisplay {
    pub name: String,
    pub template: String,
    pub vlan: String,
    pub endpoints: usize,
    pub confidence: f64,
    pub provenance: usize,
}

impl From<BridgeDomainService> for ServiceDisplay {
    fn from(service: BridgeDomainService) -> Self {
        Self {
            name: service.name,
            template: service.template.to_string(),
            vlan: service.vlan.to_string(),
            endpoints: service.endpoints.len(),
            confidence: service.confidence,
            provenance: service.provenance.len(),
        }
    }
}

impl TableDisplay for ServiceDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Template", "VLAN", "Endpoints", "Confidence", "Fragments"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.template.clone(),
            self.vlan.clone(),
            self.endpoints.to_string(),
            format!("{:.2}", self.confidence),
            self.provenance.to_string(),
        ]
    }
}

pub async fn execute(cmd: ServiceCommands, mut client: FabricClient, format: OutputFormat) -> Result<()> {
    match cmd {
        ServiceCommands::List => {
            let raw = client.list_services().await?;
            let services: Vec<ServiceDisplay> = raw
                .iter()
                .filter_map(|s| serde_json::from_str::<BridgeDomainService>(s).ok())
                .map(ServiceDisplay::from)
                .collect();
            print_list(&services, format);
        }
        ServiceCommands::Show { name } => {
            let raw = client.get_service(&name).await?;
            let service: BridgeDomainService = serde_json::from_str(&raw)?;
            print_item(&ServiceDisplay::from(service), format);
        }
    }
    Ok(())
}
