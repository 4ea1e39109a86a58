//! gRPC server implementation: the `FabricControl` service.

use crate::config::FabricConfig;
use crate::orchestrator::Orchestrator;
use crate::state::StateManager;
use crate::discovery;
use dashmap::DashMap;
use fabric_common::pathing::{compute_p2mp_paths, compute_p2p_path, DevicePath};
use fabric_common::proto::fabric_control_server::{FabricControl, FabricControlServer};
use fabric_common::proto::{
    CancelDeploymentRequest, CancelDeploymentResponse, GetDeploymentRequest, GetDeploymentResponse,
    GetServiceRequest, GetServiceResponse, GetTopologyRequest, GetTopologyResponse, ListServicesRequest,
    ListServicesResponse, StartDeploymentRequest, StartDeploymentResponse, SubmitBuildIntentRequest,
    SubmitBuildIntentResponse, TriggerDiscoveryRequest, TriggerDiscoveryResponse,
};
use fabric_common::types::{BuildIntent, Deployment, Device, DeviceConfigChange, NeighborEdge};
use fabric_common::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::{transport::Server, Request, Response, Status};
use tracing::{debug, info};

/// JSON view of a topology snapshot for `GetTopology`; the live snapshot
/// carries a `petgraph` graph that isn't itself serializable, so this is
/// the wire-facing projection of it.
#[derive(Serialize, Deserialize)]
struct TopologyView {
    devices: Vec<Device>,
    edges: Vec<NeighborEdge>,
    half_edge_anomalies: Vec<String>,
}

/// A build intent's resolved plan, persisted between `SubmitBuildIntent`
/// and `StartDeployment` so the latter only needs an opaque id.
#[derive(Serialize, Deserialize)]
struct PendingIntent {
    intent: BuildIntent,
    per_device: HashMap<String, DeviceConfigChange>,
}

#[derive(Clone)]
pub struct FabricService {
    state: StateManager,
    cancellations: Arc<DashMap<String, CancellationToken>>,
}

impl FabricService {
    pub fn new(state: StateManager, _config: FabricConfig) -> Self {
        Self {
            state,
            cancellations: Arc::new(DashMap::new()),
        }
    }

    fn resolve_paths(
        &self,
        intent: &BuildIntent,
    ) -> Result<(Arc<fabric_common::topology::TopologySnapshot>, Vec<DevicePath>), Error> {
        let snapshot = self.state.topology().ok_or_else(|| Error::IntentRejected {
            reason: "no topology snapshot available yet; run discovery first".to_string(),
        })?;

        let paths = if intent.destinations.len() == 1 {
            let mut util = fabric_common::pathing::SpineUtilization::new();
            let path = compute_p2p_path(&snapshot, &intent.source.device, &intent.destinations[0], &mut util)?;
            vec![path]
        } else {
            let spine_capacity = self.state.config().deployment.spine_service_capacity;
            compute_p2mp_paths(
                &snapshot,
                &intent.source.device,
                &intent.destinations,
                intent.strategy,
                &intent.manual_paths,
                spine_capacity,
            )?
        };
        Ok((snapshot, paths))
    }
}

#[tonic::async_trait]
impl FabricControl for FabricService {
    async fn trigger_discovery(
        &self,
        request: Request<TriggerDiscoveryRequest>,
    ) -> Result<Response<TriggerDiscoveryResponse>, Status> {
        let req = request.into_inner();
        debug!(devices = ?req.devices, "TriggerDiscovery");
        let devices = if req.devices.is_empty() { None } else { Some(req.devices) };
        let report = discovery::run_discovery(&self.state, devices.as_deref())
            .await
            .map_err(Status::from)?;

        Ok(Response::new(TriggerDiscoveryResponse {
            snapshot_id: report.snapshot_id as u64,
            fragment_count: report.fragment_count as u32,
            anomaly_count: report.anomaly_count as u32,
        }))
    }

    async fn get_topology(
        &self,
        _request: Request<GetTopologyRequest>,
    ) -> Result<Response<GetTopologyResponse>, Status> {
        let snapshot = self
            .state
            .topology()
            .ok_or_else(|| Status::not_found("no topology snapshot published yet"))?;
        let (snapshot_id, _) = self
            .state
            .db()
            .latest_topology_snapshot()
            .map_err(Status::from)?
            .ok_or_else(|| Status::not_found("no topology snapshot persisted"))?;

        let view = TopologyView {
            devices: snapshot.devices.values().cloned().collect(),
            edges: snapshot.edges.clone(),
            half_edge_anomalies: snapshot.half_edge_anomalies.iter().map(|a| a.detail.clone()).collect(),
        };
        let topology_json = serde_json::to_string(&view).map_err(fabric_common::Error::Serialization).map_err(Status::from)?;

        Ok(Response::new(GetTopologyResponse {
            snapshot_id: snapshot_id as u64,
            topology_json,
        }))
    }

    async fn list_services(
        &self,
        _request: Request<ListServicesRequest>,
    ) -> Result<Response<ListServicesResponse>, Status> {
        let services = self.state.list_services().map_err(Status::from)?;
        let services_json = services
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(fabric_common::Error::Serialization)
            .map_err(Status::from)?;

        Ok(Response::new(ListServicesResponse { services_json }))
    }

    async fn get_service(
        &self,
        request: Request<GetServiceRequest>,
    ) -> Result<Response<GetServiceResponse>, Status> {
        let req = request.into_inner();
        let service = self
            .state
            .get_service(&req.name)
            .map_err(Status::from)?
            .ok_or_else(|| Status::not_found(format!("service {} not found", req.name)))?;
        let service_json = serde_json::to_string(&service)
            .map_err(fabric_common::Error::Serialization)
            .map_err(Status::from)?;

        Ok(Response::new(GetServiceResponse { service_json }))
    }

    async fn submit_build_intent(
        &self,
        request: Request<SubmitBuildIntentRequest>,
    ) -> Result<Response<SubmitBuildIntentResponse>, Status> {
        let req = request.into_inner();
        let intent: BuildIntent = match serde_json::from_str(&req.intent_json) {
            Ok(intent) => intent,
            Err(e) => {
                return Ok(Response::new(SubmitBuildIntentResponse {
                    intent_id: String::new(),
                    plan_json: String::new(),
                    rejection_reason: format!("malformed intent_json: {e}"),
                }))
            }
        };

        let plan = async {
            let (snapshot, paths) = self.resolve_paths(&intent)?;
            let existing_services = self.state.list_services()?;
            let per_device =
                fabric_common::synth::synthesize(&intent, &paths, &existing_services, &snapshot)?;
            Ok::<_, Error>(per_device)
        }
        .await;

        let per_device = match plan {
            Ok(per_device) => per_device,
            Err(e) => {
                return Ok(Response::new(SubmitBuildIntentResponse {
                    intent_id: String::new(),
                    plan_json: String::new(),
                    rejection_reason: e.to_string(),
                }))
            }
        };

        let intent_id = uuid::Uuid::new_v4().to_string();
        let pending = PendingIntent { intent, per_device: per_device.clone() };
        let pending_json = serde_json::to_string(&pending)
            .map_err(fabric_common::Error::Serialization)
            .map_err(Status::from)?;
        self.state
            .db()
            .kv_set(&format!("intent:{intent_id}"), &pending_json)
            .map_err(Status::from)?;

        let plan_json = serde_json::to_string(&per_device)
            .map_err(fabric_common::Error::Serialization)
            .map_err(Status::from)?;

        Ok(Response::new(SubmitBuildIntentResponse {
            intent_id,
            plan_json,
            rejection_reason: String::new(),
        }))
    }

    async fn start_deployment(
        &self,
        request: Request<StartDeploymentRequest>,
    ) -> Result<Response<StartDeploymentResponse>, Status> {
        let req = request.into_inner();
        let pending_json = self
            .state
            .db()
            .kv_get(&format!("intent:{}", req.intent_id))
            .map_err(Status::from)?
            .ok_or_else(|| Status::not_found(format!("no pending intent {}", req.intent_id)))?;
        let pending: PendingIntent = serde_json::from_str(&pending_json)
            .map_err(fabric_common::Error::Serialization)
            .map_err(Status::from)?;

        let deployment_id = uuid::Uuid::new_v4().to_string();
        let deployment = Deployment::new(deployment_id.clone(), pending.intent, pending.per_device);
        self.state.insert_deployment(&deployment).map_err(Status::from)?;

        let token = CancellationToken::new();
        self.cancellations.insert(deployment_id.clone(), token.clone());

        let state = self.state.clone();
        let spawn_id = deployment_id.clone();
        let cancellations = self.cancellations.clone();
        tokio::spawn(async move {
            let orchestrator = Orchestrator::new(state);
            if let Err(e) = orchestrator.run(&spawn_id, token).await {
                tracing::error!(deployment_id = %spawn_id, error = %e, "deployment orchestrator exited with error");
            }
            cancellations.remove(&spawn_id);
        });

        info!(deployment_id, "deployment started");
        Ok(Response::new(StartDeploymentResponse { deployment_id }))
    }

    async fn get_deployment(
        &self,
        request: Request<GetDeploymentRequest>,
    ) -> Result<Response<GetDeploymentResponse>, Status> {
        let req = request.into_inner();
        let deployment = self
            .state
            .get_deployment(&req.deployment_id)
            .map_err(Status::from)?
            .ok_or_else(|| Status::not_found(format!("deployment {} not found", req.deployment_id)))?;
        let deployment_json = serde_json::to_string(&deployment)
            .map_err(fabric_common::Error::Serialization)
            .map_err(Status::from)?;

        Ok(Response::new(GetDeploymentResponse { deployment_json }))
    }

    async fn cancel_deployment(
        &self,
        request: Request<CancelDeploymentRequest>,
    ) -> Result<Response<CancelDeploymentResponse>, Status> {
        let req = request.into_inner();
        let cancelled = match self.cancellations.get(&req.deployment_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        };
        Ok(Response::new(CancelDeploymentResponse { cancelled }))
    }
}

pub async fn serve(config: FabricConfig, state: StateManager) -> anyhow::Result<()> {
    let addr = config.grpc_listen.parse()?;
    let service = FabricService::new(state, config);

    info!("gRPC server listening on {}", addr);
    Server::builder()
        .add_service(FabricControlServer::new(service))
        .serve(addr)
        .await?;

    Ok(())
}

