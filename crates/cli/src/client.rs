//! Thin wrapper over the generated `FabricControl` gRPC client.

use anyhow::Result;
use tonic::transport::Channel;

use fabric_common::proto::fabric_control_client::FabricControlClient;
use fabric_common::proto::{
    CancelDeploymentRequest, GetDeploymentRequest, GetServiceRequest, GetTopologyRequest,
    ListServicesRequest, StartDeploymentRequest, SubmitBuildIntentRequest, TriggerDiscoveryRequest,
};

pub struct FabricClient {
    inner: FabricControlClient<Channel>,
}

impl FabricClient {
    pub async fn connect(addr: &str) -> Result<Self> {
        let inner = FabricControlClient::connect(addr.to_string()).await?;
        Ok(Self { inner })
    }

    pub async fn trigger_discovery(&mut self, devices: Vec<String>) -> Result<(u64, u32, u32)> {
        let response = self
            .inner
            .trigger_discovery(TriggerDiscoveryRequest { devices })
            .await?
            .into_inner();
        Ok((response.snapshot_id, response.fragment_count, response.anomaly_count))
    }

    pub async fn get_topology(&mut self) -> Result<(u64, String)> {
        let response = self.inner.get_topology(GetTopologyRequest {}).await?.into_inner();
        Ok((response.snapshot_id, response.topology_json))
    }

    pub async fn list_services(&mut self) -> Result<Vec<String>> {
        let response = self.inner.list_services(ListServicesRequest {}).await?.into_inner();
        Ok(response.services_json)
    }

    pub async fn get_service(&mut self, name: &str) -> Result<String> {
        let response = self
            .inner
            .get_service(GetServiceRequest { name: name.to_string() })
            .await?
            .into_inner();
        Ok(response.service_json)
    }

    /// Returns `(intent_id, plan_json)` on acceptance, or `Err` carrying the
    /// daemon's rejection reason.
    pub async fn submit_build_intent(&mut self, intent_json: String) -> Result<(String, String)> {
        let response = self
            .inner
            .submit_build_intent(SubmitBuildIntentRequest { intent_json })
            .await?
            .into_inner();
        if !response.rejection_reason.is_empty() {
            anyhow::bail!(response.rejection_reason);
        }
        Ok((response.intent_id, response.plan_json))
    }

    pub async fn start_deployment(&mut self, intent_id: &str) -> Result<String> {
        let response = self
            .inner
            .start_deployment(StartDeploymentRequest { intent_id: intent_id.to_string() })
            .await?
            .into_inner();
        Ok(response.deployment_id)
    }

    pub async fn get_deployment(&mut self, deployment_id: &str) -> Result<String> {
        let response = self
            .inner
            .get_deployment(GetDeploymentRequest { deployment_id: deployment_id.to_string() })
            .await?
            .into_inner();
        Ok(response.deployment_json)
    }

    pub async fn cancel_deployment(&mut self, deployment_id: &str) -> Result<bool> {
        let response = self
            .inner
            .cancel_deployment(CancelDeploymentRequest { deployment_id: deployment_id.to_string() })
            .await?
            .into_inner();
        Ok(response.cancelled)
    }
}
