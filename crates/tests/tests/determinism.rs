//! Cross-cutting determinism check (property P4): consolidation output is
//! independent of the order fragments are discovered in, across a larger
//! multi-service set than the single-pair unit test in `consolidator.rs`.

use fabric_common::consolidator::{consolidate, DEFAULT_CONFIDENCE_FLOOR};
use fabric_common::fragment::extract_fragments;
use fabric_common::parser::{parse_command_output, CommandKind, DeviceParseReport};
use fabric_common::types::BdFragment;

fn frag(device: &str, bd_name: &str, iface: &str, vlan: u16) -> BdFragment {
    let mut report = DeviceParseReport::default();
    parse_command_output(
        device,
        CommandKind::BdInstance,
        &format!("bridge-domain {bd_name} interface {iface}"),
        &mut report,
    );
    parse_command_output(device, CommandKind::InterfaceConfig, &format!("interface {iface}"), &mut report);
    parse_command_output(device, CommandKind::VlanTable, &format!("vlan-id {vlan}"), &mut report);
    extract_fragments(device, 1, &report).remove(0)
}

#[test]
fn consolidation_of_six_fragments_across_three_services_is_order_independent() {
    let fragments = vec![
        frag("leaf-a", "g_alice_v200", "ge1.200", 200),
        frag("leaf-b", "alice-200", "ge2.200", 200),
        frag("leaf-c", "g_bob_v300", "ge1.300", 300),
        frag("leaf-d", "bob_v300", "ge2.300", 300),
        frag("leaf-e", "g_carol_v400", "ge1.400", 400),
        frag("leaf-f", "carol-400", "ge2.400", 400),
    ];

    let forward = consolidate(&fragments, DEFAULT_CONFIDENCE_FLOOR);

    let mut shuffled = fragments.clone();
    shuffled.reverse();
    shuffled.swap(0, 3);
    shuffled.swap(1, 4);
    let reordered = consolidate(&shuffled, DEFAULT_CONFIDENCE_FLOOR);

    assert_eq!(forward.services.len(), 3);
    assert_eq!(forward.services.len(), reordered.services.len());

    let mut forward_names: Vec<&str> = forward.services.iter().map(|s| s.name.as_str()).collect();
    let mut reordered_names: Vec<&str> = reordered.services.iter().map(|s| s.name.as_str()).collect();
    forward_names.sort();
    reordered_names.sort();
    assert_eq!(forward_names, reordered_names);

    for name in forward_names {
        let a = forward.services.iter().find(|s| s.name == name).unwrap();
        let b = reordered.services.iter().find(|s| s.name == name).unwrap();
        assert_eq!(a.provenance, b.provenance);
        assert_eq!(a.endpoints.len(), b.endpoints.len());
    }
}
