//! End-to-end consolidation scenario: three devices each carry a fragment
//! of the same logical service under a differently hand-edited BD name,
//! discovered independently and merged into one `BridgeDomainService`.

use fabric_common::consolidator::{consolidate, DEFAULT_CONFIDENCE_FLOOR};
use fabric_common::fragment::extract_fragments;
use fabric_common::parser::{parse_command_output, CommandKind, DeviceParseReport};
use fabric_common::types::BridgeDomainTemplate;

fn device_fragment(device: &str, bd_name: &str, iface: &str, vlan: u16) -> fabric_common::types::BdFragment {
    let mut report = DeviceParseReport::default();
    parse_command_output(
        device,
        CommandKind::BdInstance,
        &format!("bridge-domain {bd_name} interface {iface}"),
        &mut report,
    );
    parse_command_output(device, CommandKind::InterfaceConfig, &format!("interface {iface}"), &mut report);
    parse_command_output(device, CommandKind::VlanTable, &format!("vlan-id {vlan}"), &mut report);

    let mut fragments = extract_fragments(device, 1, &report);
    assert_eq!(fragments.len(), 1);
    fragments.remove(0)
}

#[test]
fn hand_edited_names_for_the_same_user_and_vlan_consolidate_into_one_service() {
    let fragments = vec![
        device_fragment("leaf-a", "g_alice_v200", "ge1.200", 200),
        device_fragment("leaf-b", "alice-200", "ge2.200", 200),
        device_fragment("leaf-c", "alice_v200", "ge3.200", 200),
    ];

    for f in &fragments {
        assert_eq!(f.members[0].vlan.expr, fabric_common::types::VlanExpr::Single(200));
    }

    let outcome = consolidate(&fragments, DEFAULT_CONFIDENCE_FLOOR);

    assert_eq!(outcome.services.len(), 1, "diagnostics: {:?}", outcome.diagnostics);
    let service = &outcome.services[0];
    assert_eq!(service.template, BridgeDomainTemplate::SingleTagged);
    assert_eq!(service.vlan.primary(), 200);
    assert_eq!(service.endpoints.len(), 3);
    assert_eq!(service.provenance.len(), 3);
    assert!(service.name.contains("alice"));
    assert!(service.confidence >= DEFAULT_CONFIDENCE_FLOOR);
}

#[test]
fn distinct_users_on_the_same_vlan_do_not_merge() {
    let fragments = vec![
        device_fragment("leaf-a", "g_alice_v500", "ge1.500", 500),
        device_fragment("leaf-b", "g_zach_v500", "ge2.500", 500),
    ];

    let outcome = consolidate(&fragments, DEFAULT_CONFIDENCE_FLOOR);
    assert_eq!(outcome.services.len(), 2);
}
