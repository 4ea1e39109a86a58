//! End-to-end P2MP scenario with the HYBRID strategy: each destination is
//! free to transit a different spine, unlike SHARED_SPINE's single common
//! transit device.

use fabric_common::parser::{parse_command_output, CommandKind, DeviceParseReport};
use fabric_common::pathing::{compute_p2mp_paths, DEFAULT_SPINE_SERVICE_CAPACITY};
use fabric_common::topology::{TopologyBuilder, TopologySnapshot};
use fabric_common::types::{Device, P2mpStrategy, ServiceEndpoint};
use std::collections::HashMap;

/// leaf-a (source) uplinks to both spines; leaf-b only reaches spine-1,
/// leaf-c only reaches spine-2, forcing HYBRID onto distinct transits.
fn dual_spine_fabric() -> TopologySnapshot {
    let mut builder = TopologyBuilder::new();
    for name in ["leaf-a", "leaf-b", "leaf-c", "spine-1", "spine-2"] {
        builder.add_device(Device::new(name, format!("10.0.1.{}", name.len())));
    }

    let mut a = DeviceParseReport::default();
    parse_command_output("leaf-a", CommandKind::LldpNeighbor, "ge1 spine-1 ge1 lldp", &mut a);
    parse_command_output("leaf-a", CommandKind::LldpNeighbor, "ge2 spine-2 ge1 lldp", &mut a);
    builder.ingest("leaf-a", &a);

    let mut b = DeviceParseReport::default();
    parse_command_output("leaf-b", CommandKind::LldpNeighbor, "ge1 spine-1 ge2 lldp", &mut b);
    builder.ingest("leaf-b", &b);

    let mut c = DeviceParseReport::default();
    parse_command_output("leaf-c", CommandKind::LldpNeighbor, "ge1 spine-2 ge2 lldp", &mut c);
    builder.ingest("leaf-c", &c);

    let mut s1 = DeviceParseReport::default();
    parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge1 leaf-a ge1 lldp", &mut s1);
    parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge2 leaf-b ge1 lldp", &mut s1);
    builder.ingest("spine-1", &s1);

    let mut s2 = DeviceParseReport::default();
    parse_command_output("spine-2", CommandKind::LldpNeighbor, "ge1 leaf-a ge2 lldp", &mut s2);
    parse_command_output("spine-2", CommandKind::LldpNeighbor, "ge2 leaf-c ge1 lldp", &mut s2);
    builder.ingest("spine-2", &s2);

    builder.build()
}

#[test]
fn hybrid_strategy_lets_each_destination_transit_its_own_spine() {
    let snapshot = dual_spine_fabric();

    let dest_b = ServiceEndpoint { device: "leaf-b".to_string(), interface: "ge1".to_string() };
    let dest_c = ServiceEndpoint { device: "leaf-c".to_string(), interface: "ge1".to_string() };

    let paths = compute_p2mp_paths(
        &snapshot,
        "leaf-a",
        &[dest_b, dest_c],
        P2mpStrategy::Hybrid,
        &HashMap::new(),
        DEFAULT_SPINE_SERVICE_CAPACITY,
    )
    .unwrap();

    assert_eq!(paths.len(), 2);
    let path_b = paths.iter().find(|p| p.destination.device == "leaf-b").unwrap();
    let path_c = paths.iter().find(|p| p.destination.device == "leaf-c").unwrap();

    assert!(path_b.devices.contains(&"spine-1".to_string()));
    assert!(!path_b.devices.contains(&"spine-2".to_string()));
    assert!(path_c.devices.contains(&"spine-2".to_string()));
    assert!(!path_c.devices.contains(&"spine-1".to_string()));
}

/// leaf-a (source) and leaf-b share spine-1 (2-tier); leaf-remote hangs off
/// a second fabric behind spine-2, joined to spine-1 only through
/// superspine-1 — reachable solely via the 3-tier remainder leg.
fn hybrid_with_superspine_remainder_fabric() -> TopologySnapshot {
    let mut builder = TopologyBuilder::new();
    for name in ["leaf-a", "leaf-b", "leaf-remote", "spine-1", "spine-2", "superspine-1"] {
        builder.add_device(Device::new(name, format!("10.0.5.{}", name.len())));
    }

    let mut a = DeviceParseReport::default();
    parse_command_output("leaf-a", CommandKind::LldpNeighbor, "ge1 spine-1 ge1 lldp", &mut a);
    builder.ingest("leaf-a", &a);

    let mut b = DeviceParseReport::default();
    parse_command_output("leaf-b", CommandKind::LldpNeighbor, "ge1 spine-1 ge2 lldp", &mut b);
    builder.ingest("leaf-b", &b);

    let mut remote = DeviceParseReport::default();
    parse_command_output("leaf-remote", CommandKind::LldpNeighbor, "ge1 spine-2 ge1 lldp", &mut remote);
    builder.ingest("leaf-remote", &remote);

    let mut s1 = DeviceParseReport::default();
    parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge1 leaf-a ge1 lldp", &mut s1);
    parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge2 leaf-b ge1 lldp", &mut s1);
    parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge3 superspine-1 ge1 lldp", &mut s1);
    builder.ingest("spine-1", &s1);

    let mut s2 = DeviceParseReport::default();
    parse_command_output("spine-2", CommandKind::LldpNeighbor, "ge1 leaf-remote ge1 lldp", &mut s2);
    parse_command_output("spine-2", CommandKind::LldpNeighbor, "ge2 superspine-1 ge2 lldp", &mut s2);
    builder.ingest("spine-2", &s2);

    let mut ss = DeviceParseReport::default();
    parse_command_output("superspine-1", CommandKind::LldpNeighbor, "ge1 spine-1 ge3 lldp", &mut ss);
    parse_command_output("superspine-1", CommandKind::LldpNeighbor, "ge2 spine-2 ge2 lldp", &mut ss);
    builder.ingest("superspine-1", &ss);

    builder.build()
}

#[test]
fn hybrid_strategy_routes_the_unreachable_remainder_through_a_superspine() {
    let snapshot = hybrid_with_superspine_remainder_fabric();

    let dest_b = ServiceEndpoint { device: "leaf-b".to_string(), interface: "ge1".to_string() };
    let dest_remote = ServiceEndpoint { device: "leaf-remote".to_string(), interface: "ge1".to_string() };

    let paths = compute_p2mp_paths(
        &snapshot,
        "leaf-a",
        &[dest_b, dest_remote],
        P2mpStrategy::Hybrid,
        &HashMap::new(),
        DEFAULT_SPINE_SERVICE_CAPACITY,
    )
    .unwrap();

    assert_eq!(paths.len(), 2);
    let path_b = paths.iter().find(|p| p.destination.device == "leaf-b").unwrap();
    let path_remote = paths.iter().find(|p| p.destination.device == "leaf-remote").unwrap();

    assert_eq!(path_b.devices, vec!["leaf-a".to_string(), "spine-1".to_string(), "leaf-b".to_string()]);
    assert!(path_remote.devices.contains(&"superspine-1".to_string()));
    assert_eq!(
        path_remote.devices,
        vec![
            "leaf-a".to_string(),
            "spine-1".to_string(),
            "superspine-1".to_string(),
            "spine-2".to_string(),
            "leaf-remote".to_string(),
        ]
    );
}
