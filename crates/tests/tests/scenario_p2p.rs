//! End-to-end point-to-point scenario: two leaves behind a shared spine,
//! a build intent between them, and the synthesized per-device commands.

use fabric_common::parser::{parse_command_output, CommandKind, DeviceParseReport};
use fabric_common::pathing::{compute_p2p_path, SpineUtilization};
use fabric_common::topology::TopologyBuilder;
use fabric_common::types::{BridgeDomainTemplate, BuildIntent, Device, P2mpStrategy, ServiceEndpoint, VlanExpr};
use fabric_common::synth::synthesize;
use std::collections::HashMap;

fn two_leaf_fabric() -> fabric_common::topology::TopologySnapshot {
    let mut builder = TopologyBuilder::new();
    builder.add_device(Device::new("leaf-a", "10.0.0.1"));
    builder.add_device(Device::new("leaf-b", "10.0.0.2"));
    builder.add_device(Device::new("spine-1", "10.0.0.3"));

    let mut a = DeviceParseReport::default();
    parse_command_output("leaf-a", CommandKind::LldpNeighbor, "ge1 spine-1 ge1 lldp", &mut a);
    builder.ingest("leaf-a", &a);

    let mut b = DeviceParseReport::default();
    parse_command_output("leaf-b", CommandKind::LldpNeighbor, "ge1 spine-1 ge2 lldp", &mut b);
    builder.ingest("leaf-b", &b);

    let mut s = DeviceParseReport::default();
    parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge1 leaf-a ge1 lldp", &mut s);
    parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge2 leaf-b ge1 lldp", &mut s);
    builder.ingest("spine-1", &s);

    builder.build()
}

#[test]
fn p2p_intent_synthesizes_a_subinterface_on_each_leaf_and_an_uplink_on_the_spine() {
    let snapshot = two_leaf_fabric();

    let intent = BuildIntent {
        service_name: "g_alice_v200".to_string(),
        template: BridgeDomainTemplate::SingleTagged,
        vlan: VlanExpr::Single(200),
        source: ServiceEndpoint { device: "leaf-a".to_string(), interface: "ge1".to_string() },
        destinations: vec![ServiceEndpoint { device: "leaf-b".to_string(), interface: "ge1".to_string() }],
        strategy: P2mpStrategy::SharedSpine,
        manual_paths: HashMap::new(),
    };

    let mut util = SpineUtilization::new();
    let path = compute_p2p_path(&snapshot, &intent.source.device, &intent.destinations[0], &mut util).unwrap();
    assert_eq!(path.devices, vec!["leaf-a".to_string(), "spine-1".to_string(), "leaf-b".to_string()]);

    let changes = synthesize(&intent, &[path], &[], &snapshot).unwrap();

    assert!(changes["leaf-a"].forward.iter().any(|c| c.0 == "interface ge1.200"));
    assert!(changes["leaf-a"].forward.iter().any(|c| c.0.contains("bridge-domain g_alice_v200 interface ge1.200")));
    assert!(changes["leaf-b"].forward.iter().any(|c| c.0 == "interface ge1.200"));

    let spine = &changes["spine-1"];
    assert!(spine.forward.iter().any(|c| c.0 == "bridge-domain g_alice_v200 uplink vlan-id 200"));
    assert!(spine.inverse.iter().any(|c| c.0 == "no bridge-domain g_alice_v200 uplink vlan-id 200"));
}
