//! End-to-end QinQ scenario: a genuine QINQ_ALL fragment classifies
//! correctly, but build intents that collide with it — either by using a
//! partial VLAN expression under QINQ_ALL, or by reusing an outer VLAN
//! already carried on a shared uplink — are rejected before synthesis.

use fabric_common::classifier::classify;
use fabric_common::error::Error;
use fabric_common::fragment::extract_fragments;
use fabric_common::parser::{parse_command_output, CommandKind, DeviceParseReport};
use fabric_common::synth::{precheck, synthesize};
use fabric_common::topology::TopologyBuilder;
use fabric_common::types::{
    BridgeDomainService, BridgeDomainTemplate, BuildIntent, FragmentId, InterfaceRef, P2mpStrategy,
    ServiceEndpoint, VlanExpr,
};
use std::collections::HashMap;

fn qinq_fragment() -> fabric_common::types::BdFragment {
    let mut report = DeviceParseReport::default();
    parse_command_output(
        "leaf-a",
        CommandKind::BdInstance,
        "bridge-domain g_carrier_vall interface ge1.999",
        &mut report,
    );
    parse_command_output("leaf-a", CommandKind::InterfaceConfig, "interface ge1.999", &mut report);
    parse_command_output("leaf-a", CommandKind::VlanTable, "vlan-id 1-4094", &mut report);

    let mut fragments = extract_fragments("leaf-a", 1, &report);
    fragments.remove(0)
}

#[test]
fn full_range_fragment_classifies_as_qinq_all() {
    let fragment = qinq_fragment();
    let result = classify(&fragment);
    assert_eq!(result.template, BridgeDomainTemplate::QinqAll);
}

#[test]
fn qinq_all_intent_rejects_a_partial_vlan_expression() {
    let intent = BuildIntent {
        service_name: "g_carrier_vall".to_string(),
        template: BridgeDomainTemplate::QinqAll,
        vlan: VlanExpr::Range(100, 200),
        source: ServiceEndpoint { device: "leaf-a".to_string(), interface: "ge1".to_string() },
        destinations: vec![ServiceEndpoint { device: "leaf-b".to_string(), interface: "ge1".to_string() }],
        strategy: P2mpStrategy::SharedSpine,
        manual_paths: HashMap::new(),
    };

    let snapshot = TopologyBuilder::new().build();
    let err = synthesize(&intent, &[], &[], &snapshot).unwrap_err();
    assert!(matches!(err, Error::IntentRejected { .. }));
}

#[test]
fn second_global_service_cannot_claim_an_outer_vlan_already_on_a_shared_uplink() {
    let existing = BridgeDomainService {
        name: "g_alice_v200".to_string(),
        template: BridgeDomainTemplate::SingleTagged,
        vlan: VlanExpr::Single(200),
        endpoints: vec![ServiceEndpoint { device: "leaf-a".to_string(), interface: "ge1".to_string() }],
        uplinks: vec![InterfaceRef::new("spine-1", "ge1")],
        paths: vec![vec!["leaf-a".to_string(), "spine-1".to_string(), "leaf-b".to_string()]],
        confidence: 1.0,
        provenance: vec![FragmentId { device: "leaf-a".to_string(), bd_name: "g_alice_v200".to_string() }],
    };

    let intent = BuildIntent {
        service_name: "g_bob_v200".to_string(),
        template: BridgeDomainTemplate::SingleTagged,
        vlan: VlanExpr::Single(200),
        source: ServiceEndpoint { device: "spine-1".to_string(), interface: "ge5".to_string() },
        destinations: vec![ServiceEndpoint { device: "leaf-c".to_string(), interface: "ge1".to_string() }],
        strategy: P2mpStrategy::SharedSpine,
        manual_paths: HashMap::new(),
    };

    let err = precheck(&intent, &[existing]).unwrap_err();
    assert!(matches!(err, Error::VlanConflict { .. }));
}
