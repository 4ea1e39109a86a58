//! Config Parser (C2) — turns raw, line-oriented CLI dumps into typed
//! records via a table of (pattern, record-builder) entries keyed by
//! command kind. The parser is total: every line yields a record or an
//! anomaly, never an `Err` abort (spec.md §4.2, property P1).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    InterfaceConfig,
    VlanTable,
    BdInstance,
    LldpNeighbor,
    LacpState,
}

/// Anomaly attached to a per-device parse report; never raised as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseAnomaly {
    pub device: String,
    pub command: CommandKind,
    pub raw_line_range: Range<usize>,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub name: String,
    pub admin_up: bool,
    pub parent: Option<String>,
    pub raw_line_range: Range<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlanRecord {
    pub interface: String,
    pub vlan_expr_text: String,
    pub raw_line_range: Range<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BdInstanceRecord {
    pub bd_name: String,
    pub interface: String,
    pub push: Vec<u16>,
    pub pop_count: u8,
    pub raw_line_range: Range<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LldpNeighborRecord {
    pub local_interface: String,
    pub remote_device: String,
    pub remote_interface: String,
    pub raw_line_range: Range<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LacpRecord {
    pub bundle: String,
    pub member: String,
    pub raw_line_range: Range<usize>,
}

/// Everything recovered from one device's command outputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceParseReport {
    pub interfaces: Vec<InterfaceRecord>,
    pub vlans: Vec<VlanRecord>,
    pub bd_instances: Vec<BdInstanceRecord>,
    pub neighbors: Vec<LldpNeighborRecord>,
    pub lacp: Vec<LacpRecord>,
    pub anomalies: Vec<ParseAnomaly>,
}

static RE_INTERFACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^interface\s+(?P<name>\S+)(?:\s+(?P<state>shutdown|no shutdown))?$").unwrap());
static RE_SUBIF_PARENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^interface\s+(?P<parent>[A-Za-z0-9/_-]+?)\.(?P<subid>\d+)$").unwrap());
static RE_VLAN_SINGLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*vlan-id\s+(?P<vid>\d{1,4})\s*$").unwrap());
static RE_VLAN_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*vlan-id\s+(?P<lo>\d{1,4})-(?P<hi>\d{1,4})\s*$").unwrap());
static RE_VLAN_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*vlan-id\s+list\s+(?P<list>[\d,]+)\s*$").unwrap());
static RE_BD_MEMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*bridge-domain\s+(?P<bd>\S+)\s+interface\s+(?P<iface>\S+)(?P<manip>.*)$").unwrap()
});
static RE_PUSH: Lazy<Regex> = Lazy::new(|| Regex::new(r"push\s+(?P<vid>\d{1,4})").unwrap());
static RE_POP: Lazy<Regex> = Lazy::new(|| Regex::new(r"pop\s+(?P<count>\d+)").unwrap());
static RE_LLDP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<local>\S+)\s+(?P<remote_dev>\S+)\s+(?P<remote_if>\S+)\s+lldp\s*$").unwrap()
});
static RE_LACP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^bundle\s+(?P<bundle>\S+)\s+member\s+(?P<member>\S+)\s*$").unwrap());

/// Parses one command's raw output for `device`, appending records/anomalies
/// into `report`. Never panics or returns `Err`: unparsed lines become
/// anomalies, per spec.md §4.2.
pub fn parse_command_output(device: &str, kind: CommandKind, raw: &str, report: &mut DeviceParseReport) {
    for (i, line) in raw.lines().enumerate() {
        let trimmed = line.trim_end();
        if trimmed.trim().is_empty() {
            continue;
        }
        let range = i..i + 1;
        let matched = match kind {
            CommandKind::InterfaceConfig => parse_interface_line(device, trimmed, range.clone(), report),
            CommandKind::VlanTable => parse_vlan_line(trimmed, range.clone(), report),
            CommandKind::BdInstance => parse_bd_line(device, trimmed, range.clone(), report),
            CommandKind::LldpNeighbor => parse_lldp_line(trimmed, range.clone(), report),
            CommandKind::LacpState => parse_lacp_line(trimmed, range.clone(), report),
        };
        if !matched {
            report.anomalies.push(ParseAnomaly {
                device: device.to_string(),
                command: kind,
                raw_line_range: range,
                detail: format!("unrecognized line: {trimmed}"),
            });
        }
    }
}

fn push_or_anomaly_on_conflict<T>(
    existing: &mut Vec<T>,
    new_rec: T,
    key: impl Fn(&T) -> String,
    anomalies: &mut Vec<ParseAnomaly>,
    device: &str,
    kind: CommandKind,
    range: Range<usize>,
) where
    T: Clone,
{
    let new_key = key(&new_rec);
    if existing.iter().any(|e| key(e) == new_key) {
        anomalies.push(ParseAnomaly {
            device: device.to_string(),
            command: kind,
            raw_line_range: range,
            detail: format!("duplicate record for {new_key}, first wins"),
        });
    } else {
        existing.push(new_rec);
    }
}

fn parse_interface_line(device: &str, line: &str, range: Range<usize>, report: &mut DeviceParseReport) -> bool {
    if let Some(caps) = RE_INTERFACE.captures(line) {
        let name = caps["name"].to_string();
        let admin_up = caps
            .name("state")
            .map(|m| m.as_str() != "shutdown")
            .unwrap_or(true);
        let parent = RE_SUBIF_PARENT
            .captures(line)
            .map(|c| c["parent"].to_string());
        let rec = InterfaceRecord {
            name: name.clone(),
            admin_up,
            parent,
            raw_line_range: range.clone(),
        };
        push_or_anomaly_on_conflict(
            &mut report.interfaces,
            rec,
            |r| r.name.clone(),
            &mut report.anomalies,
            device,
            CommandKind::InterfaceConfig,
            range,
        );
        true
    } else {
        false
    }
}

fn parse_vlan_line(line: &str, range: Range<usize>, report: &mut DeviceParseReport) -> bool {
    // vlan table lines are attributed to the most recently seen interface
    // context line, e.g. "interface ge1.100" followed by "vlan-id 100".
    let current_iface = report
        .interfaces
        .last()
        .map(|r| r.name.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let expr_text = if let Some(c) = RE_VLAN_SINGLE.captures(line) {
        Some(c["vid"].to_string())
    } else if let Some(c) = RE_VLAN_RANGE.captures(line) {
        Some(format!("{}-{}", &c["lo"], &c["hi"]))
    } else if let Some(c) = RE_VLAN_LIST.captures(line) {
        Some(c["list"].to_string())
    } else if line.trim() == "vlan-id 1-4094" {
        Some("1-4094".to_string())
    } else {
        None
    };

    if let Some(expr_text) = expr_text {
        report.vlans.push(VlanRecord {
            interface: current_iface,
            vlan_expr_text: expr_text,
            raw_line_range: range,
        });
        true
    } else {
        false
    }
}

fn parse_bd_line(device: &str, line: &str, range: Range<usize>, report: &mut DeviceParseReport) -> bool {
    if let Some(caps) = RE_BD_MEMBER.captures(line) {
        let bd_name = caps["bd"].to_string();
        let iface = caps["iface"].to_string();
        let manip = caps.name("manip").map(|m| m.as_str()).unwrap_or("");
        let push = RE_PUSH
            .captures_iter(manip)
            .filter_map(|c| c["vid"].parse::<u16>().ok())
            .collect();
        let pop_count = RE_POP
            .captures(manip)
            .and_then(|c| c["count"].parse::<u8>().ok())
            .unwrap_or(0);

        let rec = BdInstanceRecord {
            bd_name: bd_name.clone(),
            interface: iface.clone(),
            push,
            pop_count,
            raw_line_range: range.clone(),
        };
        push_or_anomaly_on_conflict(
            &mut report.bd_instances,
            rec,
            |r| format!("{}/{}", r.bd_name, r.interface),
            &mut report.anomalies,
            device,
            CommandKind::BdInstance,
            range,
        );
        true
    } else {
        false
    }
}

fn parse_lldp_line(line: &str, range: Range<usize>, report: &mut DeviceParseReport) -> bool {
    if let Some(caps) = RE_LLDP.captures(line) {
        report.neighbors.push(LldpNeighborRecord {
            local_interface: caps["local"].to_string(),
            remote_device: caps["remote_dev"].to_string(),
            remote_interface: caps["remote_if"].to_string(),
            raw_line_range: range,
        });
        true
    } else {
        false
    }
}

fn parse_lacp_line(line: &str, range: Range<usize>, report: &mut DeviceParseReport) -> bool {
    if let Some(caps) = RE_LACP.captures(line) {
        report.lacp.push(LacpRecord {
            bundle: caps["bundle"].to_string(),
            member: caps["member"].to_string(),
            raw_line_range: range,
        });
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parser_is_total_every_line_yields_record_or_anomaly() {
        let raw = "interface ge1\ngarbage line that matches nothing\ninterface ge1.100\n";
        let mut report = DeviceParseReport::default();
        parse_command_output("leaf-a", CommandKind::InterfaceConfig, raw, &mut report);
        assert_eq!(report.interfaces.len() + report.anomalies.len(), 3);
    }

    #[test]
    fn duplicate_interface_first_wins_as_anomaly() {
        let raw = "interface ge1\ninterface ge1 shutdown\n";
        let mut report = DeviceParseReport::default();
        parse_command_output("leaf-a", CommandKind::InterfaceConfig, raw, &mut report);
        assert_eq!(report.interfaces.len(), 1);
        assert!(report.interfaces[0].admin_up);
        assert_eq!(report.anomalies.len(), 1);
    }

    #[test]
    fn parses_qinq_full_range() {
        let raw = "interface ge1.200\nvlan-id 1-4094\n";
        let mut report = DeviceParseReport::default();
        parse_command_output("leaf-a", CommandKind::InterfaceConfig, "interface ge1.200", &mut report);
        parse_command_output("leaf-a", CommandKind::VlanTable, "vlan-id 1-4094", &mut report);
        let _ = raw;
        assert_eq!(report.vlans[0].vlan_expr_text, "1-4094");
    }
}
