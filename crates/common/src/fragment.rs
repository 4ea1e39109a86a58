//! BD Fragment Extractor (C4) — walks a device's BD-instance records and
//! attached interface configs, normalizes interface names, collects VLAN
//! manipulations, and emits one `BdFragment` per (device, bd-name).
//! Spec.md §4.4.

use crate::parser::DeviceParseReport;
use crate::types::{BdFragment, FragmentMember, InterfaceRef, VlanExpr, VlanSemantics, VlanTag};
use std::collections::HashMap;

/// Canonicalizes a raw interface name into `<physical>.<subid>` or
/// `bundle-<n>.<subid>` form. The parser already records subinterface
/// names as written on the device; this just normalizes separators so
/// `Ethernet1.100` and `ethernet1.100` compare equal downstream.
pub fn canonical_interface_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn parse_vlan_expr(text: &str) -> VlanExpr {
    if text == "1-4094" {
        return VlanExpr::Full1To4094;
    }
    if let Some((lo, hi)) = text.split_once('-') {
        if let (Ok(lo), Ok(hi)) = (lo.parse(), hi.parse()) {
            return VlanExpr::Range(lo, hi);
        }
    }
    if text.contains(',') {
        let vs: Vec<u16> = text.split(',').filter_map(|s| s.trim().parse().ok()).collect();
        if !vs.is_empty() {
            return VlanExpr::List(vs);
        }
    }
    text.parse().map(VlanExpr::Single).unwrap_or(VlanExpr::Single(0))
}

/// Extracts every BD fragment present in one device's parse report.
/// Empty fragments (a BD instance with no member interfaces) are still
/// emitted, flagged via `BdFragment::empty`.
pub fn extract_fragments(device: &str, snapshot_id: u64, report: &DeviceParseReport) -> Vec<BdFragment> {
    let vlan_by_iface: HashMap<String, &str> = report
        .vlans
        .iter()
        .map(|v| (canonical_interface_name(&v.interface), v.vlan_expr_text.as_str()))
        .collect();

    let mut by_bd: HashMap<String, Vec<FragmentMember>> = HashMap::new();
    for bd in &report.bd_instances {
        let iface_name = canonical_interface_name(&bd.interface);
        let expr = vlan_by_iface
            .get(&iface_name)
            .map(|t| parse_vlan_expr(t))
            .unwrap_or(VlanExpr::Single(0));
        let member = FragmentMember {
            iface: InterfaceRef::new(device, iface_name),
            vlan: VlanSemantics {
                expr,
                push: bd.push.iter().map(|v| VlanTag(*v)).collect(),
                pop_count: bd.pop_count,
                swaps: Vec::new(),
            },
        };
        by_bd.entry(bd.bd_name.clone()).or_default().push(member);
    }

    // A BD instance can be declared (e.g. via a bare "bridge-domain NAME"
    // admin line) without any interface attached; `report.bd_instances`
    // only carries member lines, so empty BDs never appear here unless a
    // caller pre-seeds `by_bd` — which `extract_fragments_with_declared`
    // does for devices whose listing separates BD creation from membership.
    by_bd
        .into_iter()
        .map(|(bd_name, members)| {
            let empty = members.is_empty();
            BdFragment {
                device: device.to_string(),
                bd_name,
                members,
                admin_up: true,
                snapshot_id,
                empty,
            }
        })
        .collect()
}

/// Same as `extract_fragments`, but also emits empty fragments for BD
/// names declared in `declared_bd_names` that never gained a member.
pub fn extract_fragments_with_declared(
    device: &str,
    snapshot_id: u64,
    report: &DeviceParseReport,
    declared_bd_names: &[String],
) -> Vec<BdFragment> {
    let mut fragments = extract_fragments(device, snapshot_id, report);
    let present: std::collections::HashSet<_> = fragments.iter().map(|f| f.bd_name.clone()).collect();
    for name in declared_bd_names {
        if !present.contains(name) {
            fragments.push(BdFragment {
                device: device.to_string(),
                bd_name: name.clone(),
                members: Vec::new(),
                admin_up: true,
                snapshot_id,
                empty: true,
            });
        }
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_command_output, CommandKind};

    #[test]
    fn extracts_single_tagged_fragment() {
        let mut report = DeviceParseReport::default();
        parse_command_output(
            "leaf-a",
            CommandKind::BdInstance,
            "bridge-domain g_user_v100 interface ge1.100",
            &mut report,
        );
        parse_command_output("leaf-a", CommandKind::InterfaceConfig, "interface ge1.100", &mut report);
        parse_command_output("leaf-a", CommandKind::VlanTable, "vlan-id 100", &mut report);

        let fragments = extract_fragments("leaf-a", 1, &report);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].bd_name, "g_user_v100");
        assert_eq!(fragments[0].members.len(), 1);
        assert_eq!(fragments[0].members[0].vlan.expr, VlanExpr::Single(100));
    }

    #[test]
    fn empty_fragment_is_flagged() {
        let fragments = extract_fragments_with_declared(
            "leaf-a",
            1,
            &DeviceParseReport::default(),
            &["g_orphan_v5".to_string()],
        );
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].empty);
    }
}
