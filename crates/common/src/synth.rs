//! Config Synthesizer (C8) — turns a validated `BuildIntent` plus computed
//! device paths into per-device `DeviceConfigChange`s. A single dispatcher
//! parameterized by `BridgeDomainTemplate`, collapsing what would otherwise
//! be separate P2P/P2MP/Unified builders. Spec.md §4.8.

use crate::error::Error;
use crate::pathing::DevicePath;
use crate::topology::TopologySnapshot;
use crate::types::{
    BridgeDomainService, BridgeDomainTemplate, BuildIntent, CliCommand, DeviceConfigChange,
    InterfaceKind, InterfaceRef, ServiceEndpoint, VlanExpr,
};
use std::collections::HashMap;

/// Validates an intent's VLAN expression against what its template allows,
/// and checks for conflicts against already-consolidated services sharing
/// an uplink's outer VLAN (spec.md §4.8 pre-checks).
pub fn precheck(
    intent: &BuildIntent,
    existing_services: &[BridgeDomainService],
) -> Result<(), Error> {
    match (&intent.template, &intent.vlan) {
        (BridgeDomainTemplate::SingleTagged, VlanExpr::List(_) | VlanExpr::Range(_, _)) => {
            return Err(Error::IntentRejected {
                reason: "SINGLE_TAGGED forbids list/range VLAN expressions".to_string(),
            });
        }
        (BridgeDomainTemplate::QinqAll, expr) if *expr != VlanExpr::Full1To4094 => {
            return Err(Error::IntentRejected {
                reason: "QINQ_ALL requires the full 1-4094 VLAN expression".to_string(),
            });
        }
        _ => {}
    }

    let mut endpoints: Vec<&ServiceEndpoint> = vec![&intent.source];
    endpoints.extend(intent.destinations.iter());

    for service in existing_services {
        if service.name == intent.service_name {
            continue;
        }
        for ep in &endpoints {
            let interface_in_use = service
                .endpoints
                .iter()
                .any(|e| e.device == ep.device && e.interface == ep.interface);
            if interface_in_use {
                return Err(Error::InterfaceInUse {
                    device: ep.device.clone(),
                    interface: ep.interface.clone(),
                    other_service: service.name.clone(),
                });
            }
        }

        // Two GLOBAL BDs (anything carried on shared uplinks, i.e. not
        // PORT_MODE) must not claim the same outer VLAN id on an uplink
        // already owned by a different service.
        if service.template != BridgeDomainTemplate::PortMode
            && intent.template != BridgeDomainTemplate::PortMode
            && service.vlan.primary() == intent.vlan.primary()
            && service
                .uplinks
                .iter()
                .any(|u| endpoints.iter().any(|e| e.device == u.device))
        {
            return Err(Error::VlanConflict {
                device: service.uplinks[0].device.clone(),
                interface: service.uplinks[0].name.clone(),
                detail: format!(
                    "outer vlan {} already carried by service {}",
                    intent.vlan.primary(),
                    service.name
                ),
            });
        }
    }

    Ok(())
}

/// Canonical subinterface name for an access/uplink interface: `<phys>.<vid>`
/// normally, or `bundle-<n>.<vid>` when `kind` is `BUNDLE` (spec.md §9 Open
/// Question, SPEC_FULL §12 — the synthesizer picks on `Interface::kind`).
fn subif_name(kind: InterfaceKind, interface: &str, vlan: u16) -> String {
    match kind {
        InterfaceKind::Bundle => {
            let n = interface.trim_start_matches(|c: char| !c.is_ascii_digit());
            if n.is_empty() {
                format!("bundle-{interface}.{vlan}")
            } else {
                format!("bundle-{n}.{vlan}")
            }
        }
        InterfaceKind::Physical | InterfaceKind::Subinterface => format!("{interface}.{vlan}"),
    }
}

/// Looks up an endpoint's interface kind in the topology, defaulting to
/// `PHYSICAL` when the interface was never discovered (e.g. a scenario test
/// that only exercises LLDP adjacency).
fn endpoint_kind(snapshot: &TopologySnapshot, endpoint: &ServiceEndpoint) -> InterfaceKind {
    snapshot
        .interfaces
        .get(&InterfaceRef::new(endpoint.device.clone(), endpoint.interface.clone()))
        .map(|i| i.kind)
        .unwrap_or(InterfaceKind::Physical)
}

/// Synthesizes the forward/inverse command pair for one endpoint device
/// under the given template, dispatching on `BridgeDomainTemplate`
/// (spec.md §9 redesign note: one dispatcher, not three builders).
fn synthesize_endpoint(
    service_name: &str,
    template: BridgeDomainTemplate,
    vlan: &VlanExpr,
    endpoint: &ServiceEndpoint,
    kind: InterfaceKind,
) -> DeviceConfigChange {
    let vid = vlan.primary();
    let (forward, inverse) = match template {
        BridgeDomainTemplate::SingleTagged | BridgeDomainTemplate::SingleTaggedRangeList => {
            let subif = subif_name(kind, &endpoint.interface, vid);
            (
                vec![
                    CliCommand(format!("interface {subif}")),
                    CliCommand(format!("vlan-id {vlan}")),
                    CliCommand(format!("bridge-domain {service_name} interface {subif}")),
                ],
                vec![
                    CliCommand(format!("no bridge-domain {service_name} interface {subif}")),
                    CliCommand(format!("no interface {subif}")),
                ],
            )
        }
        BridgeDomainTemplate::DoubleTaggedEdgeImposition => {
            let subif = subif_name(kind, &endpoint.interface, vid);
            (
                vec![
                    CliCommand(format!("interface {subif}")),
                    CliCommand(format!("vlan-id {vid} push {vid}")),
                    CliCommand(format!("bridge-domain {service_name} interface {subif}")),
                ],
                vec![
                    CliCommand(format!("no bridge-domain {service_name} interface {subif}")),
                    CliCommand(format!("no interface {subif}")),
                ],
            )
        }
        BridgeDomainTemplate::DoubleTaggedLeafImposition => {
            let subif = subif_name(kind, &endpoint.interface, vid);
            (
                vec![
                    CliCommand(format!("interface {subif}")),
                    CliCommand(format!("vlan-id {vid}")),
                    CliCommand(format!("bridge-domain {service_name} interface {subif} pop 1")),
                ],
                vec![
                    CliCommand(format!("no bridge-domain {service_name} interface {subif}")),
                    CliCommand(format!("no interface {subif}")),
                ],
            )
        }
        BridgeDomainTemplate::QinqAll => {
            let subif = subif_name(kind, &endpoint.interface, vid);
            (
                vec![
                    CliCommand(format!("interface {subif}")),
                    CliCommand("vlan-id 1-4094".to_string()),
                    CliCommand(format!("bridge-domain {service_name} interface {subif}")),
                ],
                vec![
                    CliCommand(format!("no bridge-domain {service_name} interface {subif}")),
                    CliCommand(format!("no interface {subif}")),
                ],
            )
        }
        BridgeDomainTemplate::PortMode => (
            vec![CliCommand(format!(
                "bridge-domain {service_name} interface {}",
                endpoint.interface
            ))],
            vec![CliCommand(format!(
                "no bridge-domain {service_name} interface {}",
                endpoint.interface
            ))],
        ),
        BridgeDomainTemplate::Unclassified => (Vec::new(), Vec::new()),
    };

    DeviceConfigChange {
        device: endpoint.device.clone(),
        service_name: service_name.to_string(),
        forward,
        inverse,
    }
}

/// Synthesizes uplink config for every transit device along a computed
/// path, tagging the shared outer VLAN.
fn synthesize_uplinks(service_name: &str, vlan: &VlanExpr, path: &DevicePath) -> Vec<DeviceConfigChange> {
    let vid = vlan.primary();
    path.devices
        .windows(2)
        .flat_map(|w| [w[0].clone(), w[1].clone()])
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .map(|device| DeviceConfigChange {
            device: device.clone(),
            service_name: service_name.to_string(),
            forward: vec![CliCommand(format!(
                "bridge-domain {service_name} uplink vlan-id {vid}"
            ))],
            inverse: vec![CliCommand(format!(
                "no bridge-domain {service_name} uplink vlan-id {vid}"
            ))],
        })
        .collect()
}

/// Full synthesis entry point: precheck, then emit one `DeviceConfigChange`
/// per device touched by the intent (endpoints plus transit uplinks).
/// `snapshot` supplies each endpoint's discovered `Interface::kind` so
/// subinterface naming can pick `bundle-<n>.<vid>` over `<phys>.<vid>`.
pub fn synthesize(
    intent: &BuildIntent,
    paths: &[DevicePath],
    existing_services: &[BridgeDomainService],
    snapshot: &TopologySnapshot,
) -> Result<HashMap<String, DeviceConfigChange>, Error> {
    precheck(intent, existing_services)?;

    let mut changes: HashMap<String, DeviceConfigChange> = HashMap::new();

    let source_kind = endpoint_kind(snapshot, &intent.source);
    let source_change = synthesize_endpoint(
        &intent.service_name,
        intent.template,
        &intent.vlan,
        &intent.source,
        source_kind,
    );
    changes.insert(source_change.device.clone(), source_change);

    for dest in &intent.destinations {
        let kind = endpoint_kind(snapshot, dest);
        let change = synthesize_endpoint(&intent.service_name, intent.template, &intent.vlan, dest, kind);
        changes.insert(change.device.clone(), change);
    }

    for path in paths {
        for uplink_change in synthesize_uplinks(&intent.service_name, &intent.vlan, path) {
            changes
                .entry(uplink_change.device.clone())
                .and_modify(|existing| {
                    existing.forward.extend(uplink_change.forward.clone());
                    existing.inverse.extend(uplink_change.inverse.clone());
                })
                .or_insert(uplink_change);
        }
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::TopologyBuilder;
    use crate::types::P2mpStrategy;

    fn endpoint(device: &str, iface: &str) -> ServiceEndpoint {
        ServiceEndpoint { device: device.to_string(), interface: iface.to_string() }
    }

    fn empty_snapshot() -> TopologySnapshot {
        TopologyBuilder::new().build()
    }

    fn simple_intent() -> BuildIntent {
        BuildIntent {
            service_name: "g_u_v100".to_string(),
            template: BridgeDomainTemplate::SingleTagged,
            vlan: VlanExpr::Single(100),
            source: endpoint("leaf-a", "ge1"),
            destinations: vec![endpoint("leaf-b", "ge1")],
            strategy: P2mpStrategy::SharedSpine,
            manual_paths: HashMap::new(),
        }
    }

    #[test]
    fn single_tagged_synthesizes_subinterfaces_on_both_leaves() {
        let intent = simple_intent();
        let path = DevicePath {
            destination: endpoint("leaf-b", "ge1"),
            devices: vec!["leaf-a".to_string(), "spine-1".to_string(), "leaf-b".to_string()],
        };
        let changes = synthesize(&intent, &[path], &[], &empty_snapshot()).unwrap();
        assert!(changes["leaf-a"].forward.iter().any(|c| c.0.contains("ge1.100")));
        assert!(changes["leaf-b"].forward.iter().any(|c| c.0.contains("ge1.100")));
        assert!(changes["spine-1"].forward.iter().any(|c| c.0.contains("uplink vlan-id 100")));
    }

    #[test]
    fn single_tagged_rejects_list_vlan() {
        let mut intent = simple_intent();
        intent.vlan = VlanExpr::List(vec![100, 200]);
        let err = synthesize(&intent, &[], &[], &empty_snapshot()).unwrap_err();
        assert!(matches!(err, Error::IntentRejected { .. }));
    }

    #[test]
    fn conflicting_interface_is_rejected() {
        let intent = simple_intent();
        let other = BridgeDomainService {
            name: "g_other_v999".to_string(),
            template: BridgeDomainTemplate::SingleTagged,
            vlan: VlanExpr::Single(999),
            endpoints: vec![endpoint("leaf-a", "ge1")],
            uplinks: Vec::new(),
            paths: Vec::new(),
            confidence: 1.0,
            provenance: Vec::new(),
        };
        let err = synthesize(&intent, &[], &[other], &empty_snapshot()).unwrap_err();
        assert!(matches!(err, Error::InterfaceInUse { .. }));
    }

    #[test]
    fn bundle_endpoint_synthesizes_bundle_subinterface_name() {
        let mut builder = TopologyBuilder::new();
        builder.add_device(crate::types::Device::new("leaf-a", "10.0.3.1"));
        let mut report = crate::parser::DeviceParseReport::default();
        crate::parser::parse_command_output(
            "leaf-a",
            crate::parser::CommandKind::LacpState,
            "bundle bundle-7 member ge1",
            &mut report,
        );
        crate::parser::parse_command_output(
            "leaf-a",
            crate::parser::CommandKind::InterfaceConfig,
            "interface bundle-7",
            &mut report,
        );
        crate::parser::parse_command_output(
            "leaf-a",
            crate::parser::CommandKind::InterfaceConfig,
            "interface ge1",
            &mut report,
        );
        builder.ingest("leaf-a", &report);
        let snapshot = builder.build();

        let mut intent = simple_intent();
        intent.source = endpoint("leaf-a", "bundle-7");
        let changes = synthesize(&intent, &[], &[], &snapshot).unwrap();
        assert!(changes["leaf-a"].forward.iter().any(|c| c.0 == "interface bundle-7.100"));
    }
}
