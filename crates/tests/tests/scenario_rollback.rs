//! End-to-end rollback scenario: a deployment stages and commit-checks
//! cleanly everywhere, but one device fails commit — every device that
//! had already committed gets its inverse commands applied, edge
//! (endpoint) devices before the core/transit device, mirroring the
//! daemon's deployment orchestrator without depending on its crate.

use fabric_common::pathing::{compute_p2p_path, SpineUtilization};
use fabric_common::synth::synthesize;
use fabric_common::topology::TopologyBuilder;
use fabric_common::transport::{DeviceTransport, MockTransport};
use fabric_common::types::{BridgeDomainTemplate, BuildIntent, Device, P2mpStrategy, ServiceEndpoint, VlanExpr};
use std::collections::HashMap;

fn two_leaf_fabric() -> fabric_common::topology::TopologySnapshot {
    let mut builder = TopologyBuilder::new();
    builder.add_device(Device::new("leaf-a", "10.0.0.1"));
    builder.add_device(Device::new("leaf-b", "10.0.0.2"));
    builder.add_device(Device::new("spine-1", "10.0.0.3"));

    let mut a = fabric_common::parser::DeviceParseReport::default();
    fabric_common::parser::parse_command_output(
        "leaf-a",
        fabric_common::parser::CommandKind::LldpNeighbor,
        "ge1 spine-1 ge1 lldp",
        &mut a,
    );
    builder.ingest("leaf-a", &a);

    let mut b = fabric_common::parser::DeviceParseReport::default();
    fabric_common::parser::parse_command_output(
        "leaf-b",
        fabric_common::parser::CommandKind::LldpNeighbor,
        "ge1 spine-1 ge2 lldp",
        &mut b,
    );
    builder.ingest("leaf-b", &b);

    let mut s = fabric_common::parser::DeviceParseReport::default();
    fabric_common::parser::parse_command_output(
        "spine-1",
        fabric_common::parser::CommandKind::LldpNeighbor,
        "ge1 leaf-a ge1 lldp",
        &mut s,
    );
    fabric_common::parser::parse_command_output(
        "spine-1",
        fabric_common::parser::CommandKind::LldpNeighbor,
        "ge2 leaf-b ge1 lldp",
        &mut s,
    );
    builder.ingest("spine-1", &s);

    builder.build()
}

/// Edge (endpoint) devices roll back before the core/transit device, per
/// the daemon's reverse-dependency-order guarantee.
fn rollback_order(source: &str, destinations: &[&str], devices: &[String]) -> Vec<String> {
    let mut edge = std::collections::HashSet::new();
    edge.insert(source.to_string());
    for d in destinations {
        edge.insert(d.to_string());
    }
    let mut ordered: Vec<String> = devices.to_vec();
    ordered.sort_by_key(|d| (!edge.contains(d), d.clone()));
    ordered
}

#[tokio::test]
async fn commit_failure_on_one_device_rolls_back_every_already_committed_device_edge_first() {
    let snapshot = two_leaf_fabric();
    let intent = BuildIntent {
        service_name: "g_carol_v400".to_string(),
        template: BridgeDomainTemplate::SingleTagged,
        vlan: VlanExpr::Single(400),
        source: ServiceEndpoint { device: "leaf-a".to_string(), interface: "ge1".to_string() },
        destinations: vec![ServiceEndpoint { device: "leaf-b".to_string(), interface: "ge1".to_string() }],
        strategy: P2mpStrategy::SharedSpine,
        manual_paths: HashMap::new(),
    };
    let mut util = SpineUtilization::new();
    let path = compute_p2p_path(&snapshot, &intent.source.device, &intent.destinations[0], &mut util).unwrap();
    let changes = synthesize(&intent, &[path], &[], &snapshot).unwrap();

    let transport = MockTransport::new();
    for (device, change) in &changes {
        for cmd in &change.forward {
            transport.script(device, &cmd.0, "");
        }
        for cmd in &change.inverse {
            transport.script(device, &cmd.0, "");
        }
        transport.script(device, "commit check", "");
    }
    // Commit succeeds everywhere except leaf-b, which fails to commit.
    transport.script("leaf-a", "commit", "");
    transport.script("spine-1", "commit", "");

    let devices: Vec<String> = {
        let mut d: Vec<String> = changes.keys().cloned().collect();
        d.sort();
        d
    };

    // Stage + commit-check fan out.
    for device in &devices {
        transport.dial(device).await.unwrap();
        let change = &changes[device];
        let batch: Vec<String> = change.forward.iter().map(|c| c.0.clone()).collect();
        transport.exec_batch(device, &batch).await.unwrap();
        transport.exec(device, "commit check").await.unwrap();
    }

    // Commit phase: leaf-b has no scripted "commit" response, so it fails.
    let mut committed = Vec::new();
    for device in &devices {
        if transport.exec(device, "commit").await.is_ok() {
            committed.push(device.clone());
        }
    }
    assert_eq!(committed, vec!["leaf-a".to_string(), "spine-1".to_string()]);

    // Roll back every committed device, edge (leaf-a) before core (spine-1).
    let order = rollback_order("leaf-a", &["leaf-b"], &committed);
    assert_eq!(order, vec!["leaf-a".to_string(), "spine-1".to_string()]);

    for device in &order {
        let change = &changes[device];
        let batch: Vec<String> = change.inverse.iter().map(|c| c.0.clone()).collect();
        transport.exec_batch(device, &batch).await.unwrap();
        transport.exec(device, "commit").await.unwrap();
    }

    // leaf-b was never committed, so it never dials for an inverse pass;
    // it only appears once, from the stage/commit-check phase above.
    assert_eq!(transport.dialed_devices().iter().filter(|d| *d == "leaf-b").count(), 1);
}
