//! End-to-end P2MP scenario with the SHARED_SPINE strategy: one source
//! leaf fanning out to two destination leaves, all routed through the
//! single least-utilized common spine.

use fabric_common::parser::{parse_command_output, CommandKind, DeviceParseReport};
use fabric_common::pathing::{compute_p2mp_paths, DEFAULT_SPINE_SERVICE_CAPACITY};
use fabric_common::topology::{TopologyBuilder, TopologySnapshot};
use fabric_common::types::{BridgeDomainTemplate, BuildIntent, Device, P2mpStrategy, ServiceEndpoint, VlanExpr};
use fabric_common::synth::synthesize;
use std::collections::HashMap;

/// leaf-a (source) hangs off spine-1 only; leaf-b and leaf-c also hang
/// off spine-1, so every destination is forced through the same spine.
fn hub_and_spoke_fabric() -> TopologySnapshot {
    let mut builder = TopologyBuilder::new();
    for name in ["leaf-a", "leaf-b", "leaf-c", "spine-1"] {
        builder.add_device(Device::new(name, format!("10.0.0.{}", name.len())));
    }

    let mut a = DeviceParseReport::default();
    parse_command_output("leaf-a", CommandKind::LldpNeighbor, "ge1 spine-1 ge1 lldp", &mut a);
    builder.ingest("leaf-a", &a);

    let mut b = DeviceParseReport::default();
    parse_command_output("leaf-b", CommandKind::LldpNeighbor, "ge1 spine-1 ge2 lldp", &mut b);
    builder.ingest("leaf-b", &b);

    let mut c = DeviceParseReport::default();
    parse_command_output("leaf-c", CommandKind::LldpNeighbor, "ge1 spine-1 ge3 lldp", &mut c);
    builder.ingest("leaf-c", &c);

    let mut s = DeviceParseReport::default();
    parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge1 leaf-a ge1 lldp", &mut s);
    parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge2 leaf-b ge1 lldp", &mut s);
    parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge3 leaf-c ge1 lldp", &mut s);
    builder.ingest("spine-1", &s);

    builder.build()
}

#[test]
fn shared_spine_routes_every_destination_through_the_one_common_spine() {
    let snapshot = hub_and_spoke_fabric();

    let dest_b = ServiceEndpoint { device: "leaf-b".to_string(), interface: "ge1".to_string() };
    let dest_c = ServiceEndpoint { device: "leaf-c".to_string(), interface: "ge1".to_string() };

    let paths = compute_p2mp_paths(
        &snapshot,
        "leaf-a",
        &[dest_b.clone(), dest_c.clone()],
        P2mpStrategy::SharedSpine,
        &HashMap::new(),
        DEFAULT_SPINE_SERVICE_CAPACITY,
    )
    .unwrap();

    assert_eq!(paths.len(), 2);
    assert!(paths.iter().all(|p| p.devices.contains(&"spine-1".to_string())));

    let intent = BuildIntent {
        service_name: "g_bob_v300".to_string(),
        template: BridgeDomainTemplate::SingleTagged,
        vlan: VlanExpr::Single(300),
        source: ServiceEndpoint { device: "leaf-a".to_string(), interface: "ge1".to_string() },
        destinations: vec![dest_b, dest_c],
        strategy: P2mpStrategy::SharedSpine,
        manual_paths: HashMap::new(),
    };

    let changes = synthesize(&intent, &paths, &[], &snapshot).unwrap();
    assert!(changes["leaf-a"].forward.iter().any(|c| c.0.contains("ge1.300")));
    assert!(changes["leaf-b"].forward.iter().any(|c| c.0.contains("ge1.300")));
    assert!(changes["leaf-c"].forward.iter().any(|c| c.0.contains("ge1.300")));
    assert!(changes["spine-1"].forward.iter().any(|c| c.0 == "bridge-domain g_bob_v300 uplink vlan-id 300"));
}

/// leaf-a (source) uplinks to both spines; leaf-b and leaf-c only reach
/// spine-1, leaf-d only reaches spine-2 — the set-cover must pick spine-1
/// first (it covers two destinations) and spine-2 only for the remainder.
fn two_spine_fabric() -> TopologySnapshot {
    let mut builder = TopologyBuilder::new();
    for name in ["leaf-a", "leaf-b", "leaf-c", "leaf-d", "spine-1", "spine-2"] {
        builder.add_device(Device::new(name, format!("10.0.4.{}", name.len())));
    }

    let mut a = DeviceParseReport::default();
    parse_command_output("leaf-a", CommandKind::LldpNeighbor, "ge1 spine-1 ge1 lldp", &mut a);
    parse_command_output("leaf-a", CommandKind::LldpNeighbor, "ge2 spine-2 ge1 lldp", &mut a);
    builder.ingest("leaf-a", &a);

    let mut b = DeviceParseReport::default();
    parse_command_output("leaf-b", CommandKind::LldpNeighbor, "ge1 spine-1 ge2 lldp", &mut b);
    builder.ingest("leaf-b", &b);

    let mut c = DeviceParseReport::default();
    parse_command_output("leaf-c", CommandKind::LldpNeighbor, "ge1 spine-1 ge3 lldp", &mut c);
    builder.ingest("leaf-c", &c);

    let mut d = DeviceParseReport::default();
    parse_command_output("leaf-d", CommandKind::LldpNeighbor, "ge1 spine-2 ge2 lldp", &mut d);
    builder.ingest("leaf-d", &d);

    let mut s1 = DeviceParseReport::default();
    parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge1 leaf-a ge1 lldp", &mut s1);
    parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge2 leaf-b ge1 lldp", &mut s1);
    parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge3 leaf-c ge1 lldp", &mut s1);
    builder.ingest("spine-1", &s1);

    let mut s2 = DeviceParseReport::default();
    parse_command_output("spine-2", CommandKind::LldpNeighbor, "ge1 leaf-a ge2 lldp", &mut s2);
    parse_command_output("spine-2", CommandKind::LldpNeighbor, "ge2 leaf-d ge1 lldp", &mut s2);
    builder.ingest("spine-2", &s2);

    builder.build()
}

#[test]
fn shared_spine_set_cover_splits_destinations_across_two_spines() {
    let snapshot = two_spine_fabric();

    let dest_b = ServiceEndpoint { device: "leaf-b".to_string(), interface: "ge1".to_string() };
    let dest_c = ServiceEndpoint { device: "leaf-c".to_string(), interface: "ge1".to_string() };
    let dest_d = ServiceEndpoint { device: "leaf-d".to_string(), interface: "ge1".to_string() };

    let paths = compute_p2mp_paths(
        &snapshot,
        "leaf-a",
        &[dest_b, dest_c, dest_d],
        P2mpStrategy::SharedSpine,
        &HashMap::new(),
        DEFAULT_SPINE_SERVICE_CAPACITY,
    )
    .unwrap();

    assert_eq!(paths.len(), 3);
    let path_b = paths.iter().find(|p| p.destination.device == "leaf-b").unwrap();
    let path_c = paths.iter().find(|p| p.destination.device == "leaf-c").unwrap();
    let path_d = paths.iter().find(|p| p.destination.device == "leaf-d").unwrap();

    assert!(path_b.devices.contains(&"spine-1".to_string()));
    assert!(path_c.devices.contains(&"spine-1".to_string()));
    assert!(path_d.devices.contains(&"spine-2".to_string()));
    assert!(!path_d.devices.contains(&"spine-1".to_string()));

    let spines_used: std::collections::HashSet<&String> = paths
        .iter()
        .flat_map(|p| p.devices.iter().filter(|d| d.starts_with("spine-")))
        .collect();
    assert_eq!(spines_used.len(), 2, "set-cover should use exactly 2 spines, not 3 per-destination transits");
}
