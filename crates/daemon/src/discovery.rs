//! Discovery pipeline: dials the device inventory, runs the parser (C2),
//! topology builder (C3), fragment extractor (C4), classifier (C5) and
//! consolidator (C6), then persists and publishes the result. Runs either
//! on the configured schedule or on an explicit gRPC trigger.

use crate::state::StateManager;
use fabric_common::consolidator::consolidate;
use fabric_common::fragment::extract_fragments;
use fabric_common::parser::{parse_command_output, CommandKind, DeviceParseReport};
use fabric_common::topology::TopologyBuilder;
use fabric_common::transport::DeviceTransport;
use fabric_common::types::{BdFragment, Device, Diagnostic, TopologySnapshotRecord};
use fabric_common::Result;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Command set consumed from every device (spec.md §4.1): interface
/// listing, VLAN config, BD instances, LLDP neighbors, LACP state.
const DISCOVERY_COMMANDS: &[(&str, CommandKind)] = &[
    ("show interfaces", CommandKind::InterfaceConfig),
    ("show vlan", CommandKind::VlanTable),
    ("show bridge-domain", CommandKind::BdInstance),
    ("show lldp neighbors", CommandKind::LldpNeighbor),
    ("show lacp", CommandKind::LacpState),
];

pub struct DiscoveryReport {
    pub snapshot_id: i64,
    pub fragment_count: usize,
    pub anomaly_count: usize,
}

async fn discover_device(
    transport: &dyn DeviceTransport,
    device: &str,
) -> Result<(DeviceParseReport, Vec<BdFragment>)> {
    transport.dial(device).await?;
    let mut report = DeviceParseReport::default();
    for (command, kind) in DISCOVERY_COMMANDS {
        let result = transport.exec(device, command).await?;
        parse_command_output(device, *kind, &result.stdout, &mut report);
    }
    let fragments = extract_fragments(device, 0, &report);
    Ok((report, fragments))
}

/// Runs one discovery pass against `devices` (or the whole inventory when
/// `None`), bounded to `max_concurrent_devices` in flight at a time.
pub async fn run_discovery(state: &StateManager, devices: Option<&[String]>) -> Result<DiscoveryReport> {
    let inventory = state.device_inventory();
    let targets: Vec<String> = match devices {
        Some(names) if !names.is_empty() => names.to_vec(),
        _ => {
            let mut names: Vec<String> = inventory.keys().cloned().collect();
            names.sort();
            names
        }
    };

    let transport = state.transport();
    let max_concurrent = state.config().deployment.max_concurrent_devices.max(1);
    let semaphore = std::sync::Arc::new(Semaphore::new(max_concurrent));

    let mut handles = Vec::with_capacity(targets.len());
    for device in &targets {
        let transport = transport.clone();
        let semaphore = semaphore.clone();
        let device = device.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            discover_device(transport.as_ref(), &device).await
        }));
    }

    let mut builder = TopologyBuilder::new();
    let mut fragments: Vec<BdFragment> = Vec::new();
    let mut diagnostics: Vec<Diagnostic> = Vec::new();

    for (device, handle) in targets.iter().zip(handles) {
        let mgmt_addr = inventory.get(device).cloned().unwrap_or_default();
        builder.add_device(Device::new(device.clone(), mgmt_addr));

        match handle.await {
            Ok(Ok((report, device_fragments))) => {
                builder.ingest(device, &report);
                fragments.extend(device_fragments);
            }
            Ok(Err(e)) => {
                warn!(device, error = %e, "discovery failed for device");
                diagnostics.push(Diagnostic {
                    kind: "DiscoveryFailed".to_string(),
                    message: e.to_string(),
                    device: Some(device.clone()),
                });
            }
            Err(join_err) => {
                warn!(device, error = %join_err, "discovery task did not complete");
                diagnostics.push(Diagnostic {
                    kind: "DiscoveryTaskFailed".to_string(),
                    message: join_err.to_string(),
                    device: Some(device.clone()),
                });
            }
        }
    }

    let snapshot = builder.build();
    for anomaly in &snapshot.half_edge_anomalies {
        diagnostics.push(Diagnostic {
            kind: "HalfEdgeAnomaly".to_string(),
            message: anomaly.detail.clone(),
            device: Some(anomaly.local.device.clone()),
        });
    }

    let confidence_floor = state.config().consolidation.confidence_floor;
    let outcome = consolidate(&fragments, confidence_floor);
    for diag in &outcome.diagnostics {
        diagnostics.push(Diagnostic {
            kind: diag.kind.clone(),
            message: diag.detail.clone(),
            device: None,
        });
    }

    let record = TopologySnapshotRecord {
        device_count: snapshot.devices.len(),
        edge_count: snapshot.edges.len(),
        half_edge_anomaly_count: snapshot.half_edge_anomalies.len(),
    };
    let snapshot_id = state.db().insert_topology_snapshot(&record)?;
    for frag in &mut fragments {
        frag.snapshot_id = snapshot_id as u64;
    }
    state.db().replace_fragments(snapshot_id, &fragments)?;

    for service in &outcome.services {
        state.upsert_service(service)?;
    }
    for diag in &diagnostics {
        state.record_diagnostic(diag.clone())?;
    }

    state.publish_topology(snapshot);

    info!(
        snapshot_id,
        devices = targets.len(),
        fragments = fragments.len(),
        services = outcome.services.len(),
        anomalies = diagnostics.len(),
        "discovery run complete"
    );

    Ok(DiscoveryReport {
        snapshot_id,
        fragment_count: fragments.len(),
        anomaly_count: diagnostics.len(),
    })
}

/// Background loop honoring `DiscoveryConfig::interval_seconds`; 0 disables
/// the periodic schedule and leaves discovery purely trigger-driven.
pub async fn run_periodic(state: StateManager) {
    let interval = state.config().discovery.interval_seconds;
    if interval == 0 {
        info!("periodic discovery disabled (interval_seconds = 0)");
        return;
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    loop {
        ticker.tick().await;
        if let Err(e) = run_discovery(&state, None).await {
            warn!(error = %e, "scheduled discovery run failed");
        }
    }
}
