//! Topology Model (C3) — in-memory graph built from parser output across
//! all devices. Immutable once published; readers never see partial state
//! (spec.md §4.3, §5, §9 "snapshot + swap").

use crate::error::Error;
use crate::parser::DeviceParseReport;
use crate::types::{
    Device, DeviceRole, EdgeTier, Interface, InterfaceKind, InterfaceRef, InterfaceRole,
    NeighborEdge, RoleInference, RoleInferenceRule,
};
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::HashMap;

/// Minimum number of uplinks to spine-like peers before a device is
/// promoted to LEAF by the neighbor-degree rule (spec.md §4.3).
pub const MIN_UPLINKS_FOR_LEAF_PROMOTION: usize = 1;

#[derive(Debug, Clone)]
pub struct HalfEdgeAnomaly {
    pub local: InterfaceRef,
    pub claimed_remote: InterfaceRef,
    pub detail: String,
}

/// An immutable, published view of the fabric. Built once per discovery
/// run by `TopologyBuilder::build`, then shared behind an `Arc` — see
/// `fabric-daemon::state::StateManager`.
#[derive(Debug, Clone)]
pub struct TopologySnapshot {
    pub devices: HashMap<String, Device>,
    pub interfaces: HashMap<InterfaceRef, Interface>,
    pub edges: Vec<NeighborEdge>,
    pub half_edge_anomalies: Vec<HalfEdgeAnomaly>,
    graph: UnGraph<String, ()>,
    node_index: HashMap<String, NodeIndex>,
}

impl TopologySnapshot {
    pub fn neighbors(&self, device: &str) -> Vec<&Device> {
        let Some(&idx) = self.node_index.get(device) else {
            return Vec::new();
        };
        self.graph
            .neighbors(idx)
            .filter_map(|n| self.devices.get(&self.graph[n]))
            .collect()
    }

    pub fn leaves(&self) -> Vec<&Device> {
        self.devices.values().filter(|d| d.role == DeviceRole::Leaf).collect()
    }

    pub fn spines(&self) -> Vec<&Device> {
        self.devices.values().filter(|d| d.role == DeviceRole::Spine).collect()
    }

    pub fn superspines(&self) -> Vec<&Device> {
        self.devices
            .values()
            .filter(|d| d.role == DeviceRole::Superspine)
            .collect()
    }

    pub fn interfaces(&self, device: &str) -> Vec<&Interface> {
        self.interfaces.values().filter(|i| i.device == device).collect()
    }

    pub fn parent(&self, iface: &InterfaceRef) -> Option<&InterfaceRef> {
        self.interfaces.get(iface).and_then(|i| i.parent.as_ref())
    }

    pub fn bundle_members(&self, bundle: &InterfaceRef) -> Vec<InterfaceRef> {
        self.interfaces
            .values()
            .filter(|i| i.parent.as_ref() == Some(bundle) && i.kind == InterfaceKind::Physical)
            .map(|i| i.as_ref())
            .collect()
    }

    /// Direct edges between two device names, used by the path engine.
    pub fn edge_between(&self, a: &str, b: &str) -> Option<&NeighborEdge> {
        self.edges
            .iter()
            .find(|e| (e.a.device == a && e.b.device == b) || (e.a.device == b && e.b.device == a))
    }

    pub fn device_names_adjacent(&self, device: &str) -> Vec<String> {
        self.neighbors(device).iter().map(|d| d.name.clone()).collect()
    }

    pub fn graph(&self) -> &UnGraph<String, ()> {
        &self.graph
    }

    pub fn node_index(&self) -> &HashMap<String, NodeIndex> {
        &self.node_index
    }
}

/// Half of a discovered link, derived from one device's LLDP table.
#[derive(Debug, Clone)]
pub struct HalfEdge {
    pub local: InterfaceRef,
    pub remote: InterfaceRef,
}

pub struct TopologyBuilder {
    devices: HashMap<String, Device>,
    interfaces: HashMap<InterfaceRef, Interface>,
    half_edges: Vec<HalfEdge>,
}

impl Default for TopologyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
            interfaces: HashMap::new(),
            half_edges: Vec::new(),
        }
    }

    pub fn add_device(&mut self, device: Device) {
        self.devices.insert(device.name.clone(), device);
    }

    /// Ingest one device's parse report into the builder's interface set
    /// and half-edge list.
    pub fn ingest(&mut self, device: &str, report: &DeviceParseReport) {
        for rec in &report.interfaces {
            let bundle_owner = report
                .lacp
                .iter()
                .find(|l| l.member == rec.name)
                .map(|l| InterfaceRef::new(device, l.bundle.clone()));

            let (kind, parent) = if rec.parent.is_some() {
                (
                    InterfaceKind::Subinterface,
                    rec.parent.as_ref().map(|p| InterfaceRef::new(device, p.clone())),
                )
            } else if report.lacp.iter().any(|l| l.bundle == rec.name) {
                (InterfaceKind::Bundle, None)
            } else if let Some(owner) = bundle_owner {
                (InterfaceKind::Physical, Some(owner))
            } else {
                (InterfaceKind::Physical, None)
            };

            let iface = Interface {
                device: device.to_string(),
                name: rec.name.clone(),
                kind,
                parent,
                admin_up: rec.admin_up,
                role: InterfaceRole::Unknown,
            };
            self.interfaces.insert(iface.as_ref(), iface);
        }

        for rec in &report.neighbors {
            self.half_edges.push(HalfEdge {
                local: InterfaceRef::new(device, rec.local_interface.clone()),
                remote: InterfaceRef::new(rec.remote_device.clone(), rec.remote_interface.clone()),
            });
        }
    }

    /// Runs role inference and half-edge coalescing, producing the
    /// immutable snapshot. Never fails: unresolvable inputs become
    /// `HalfEdgeAnomaly`/`UnknownRole` and are recorded rather than raised.
    pub fn build(mut self) -> TopologySnapshot {
        self.infer_roles();
        let (edges, anomalies) = Self::coalesce_half_edges(&self.half_edges);

        let mut graph = UnGraph::<String, ()>::new_undirected();
        let mut node_index = HashMap::new();
        for name in self.devices.keys() {
            let idx = graph.add_node(name.clone());
            node_index.insert(name.clone(), idx);
        }
        for edge in &edges {
            if let (Some(&ia), Some(&ib)) = (node_index.get(&edge.a.device), node_index.get(&edge.b.device)) {
                graph.update_edge(ia, ib, ());
            }
        }

        let mut snapshot = TopologySnapshot {
            devices: self.devices,
            interfaces: self.interfaces,
            edges,
            half_edge_anomalies: anomalies,
            graph,
            node_index,
        };
        finalize_edge_tiers(&mut snapshot);
        snapshot
    }

    /// Name-prefix match, then neighbor-degree promotion, then majority
    /// vote tiebreak — each attaching confidence and the rule that fired
    /// (spec.md §4.3).
    fn infer_roles(&mut self) {
        let mut by_name_prefix: HashMap<String, DeviceRole> = HashMap::new();
        for name in self.devices.keys() {
            let lower = name.to_lowercase();
            let role = if lower.contains("superspine") {
                DeviceRole::Superspine
            } else if lower.contains("spine") {
                DeviceRole::Spine
            } else if lower.contains("leaf") {
                DeviceRole::Leaf
            } else {
                DeviceRole::Unknown
            };
            by_name_prefix.insert(name.clone(), role);
        }

        // neighbor-degree promotion needs edges, which require roles from
        // name-prefix first; compute uplink counts from half-edges.
        let mut uplink_counts: HashMap<String, usize> = HashMap::new();
        for he in &self.half_edges {
            let remote_role = by_name_prefix
                .get(&he.remote.device)
                .copied()
                .unwrap_or(DeviceRole::Unknown);
            if matches!(remote_role, DeviceRole::Spine | DeviceRole::Superspine) {
                *uplink_counts.entry(he.local.device.clone()).or_insert(0) += 1;
            }
        }

        let names: Vec<String> = self.devices.keys().cloned().collect();
        for name in names {
            let prefix_role = by_name_prefix.get(&name).copied().unwrap_or(DeviceRole::Unknown);
            let (role, confidence, rule) = if prefix_role != DeviceRole::Unknown {
                (prefix_role, 0.95, RoleInferenceRule::NamePrefix)
            } else if uplink_counts.get(&name).copied().unwrap_or(0) >= MIN_UPLINKS_FOR_LEAF_PROMOTION {
                (DeviceRole::Leaf, 0.7, RoleInferenceRule::NeighborDegree)
            } else {
                // majority-vote tiebreak among immediate neighbors' prefix roles
                let mut votes: HashMap<DeviceRole, usize> = HashMap::new();
                for he in self.half_edges.iter().filter(|he| he.local.device == name) {
                    let r = by_name_prefix
                        .get(&he.remote.device)
                        .copied()
                        .unwrap_or(DeviceRole::Unknown);
                    *votes.entry(r).or_insert(0) += 1;
                }
                votes
                    .into_iter()
                    .max_by_key(|(_, c)| *c)
                    .map(|(r, _)| (r, 0.5, RoleInferenceRule::MajorityVote))
                    .unwrap_or((DeviceRole::Unknown, 0.0, RoleInferenceRule::MajorityVote))
            };

            if let Some(d) = self.devices.get_mut(&name) {
                d.role = role;
                d.role_inference = Some(RoleInference { role, confidence, rule });
            }
        }
    }

    /// Two half-edges from each side must agree (same local/remote
    /// interface) to be promoted to a full edge; otherwise a
    /// `HalfEdgeAnomaly` is recorded (spec.md §4.3).
    fn coalesce_half_edges(half_edges: &[HalfEdge]) -> (Vec<NeighborEdge>, Vec<HalfEdgeAnomaly>) {
        let mut by_local: HashMap<InterfaceRef, &HalfEdge> = HashMap::new();
        for he in half_edges {
            by_local.insert(he.local.clone(), he);
        }

        let mut seen_keys = std::collections::HashSet::new();
        let mut edges = Vec::new();
        let mut anomalies = Vec::new();

        for he in half_edges {
            let reciprocal = by_local.get(&he.remote);
            match reciprocal {
                Some(r) if r.remote == he.local => {
                    let mut key = [he.local.clone(), he.remote.clone()];
                    key.sort_by_key(|r| (r.device.clone(), r.name.clone()));
                    if seen_keys.insert((key[0].clone(), key[1].clone())) {
                        edges.push(NeighborEdge {
                            a: he.local.clone(),
                            b: he.remote.clone(),
                            tier: EdgeTier::Other, // finalized below once roles are known
                        });
                    }
                }
                Some(r) => {
                    anomalies.push(HalfEdgeAnomaly {
                        local: he.local.clone(),
                        claimed_remote: he.remote.clone(),
                        detail: format!(
                            "reciprocal half-edge from {} points to {} instead of {}",
                            he.remote, r.remote, he.local
                        ),
                    });
                }
                None => {
                    anomalies.push(HalfEdgeAnomaly {
                        local: he.local.clone(),
                        claimed_remote: he.remote.clone(),
                        detail: "no reciprocal half-edge reported by remote device".to_string(),
                    });
                }
            }
        }

        (edges, anomalies)
    }
}

/// Finalizes edge tiers now that device roles are known. Kept separate
/// from coalescing so unit tests can exercise coalescing in isolation.
pub fn finalize_edge_tiers(snapshot: &mut TopologySnapshot) {
    let devices = snapshot.devices.clone();
    for edge in &mut snapshot.edges {
        let role_a = devices.get(&edge.a.device).map(|d| d.role).unwrap_or(DeviceRole::Unknown);
        let role_b = devices.get(&edge.b.device).map(|d| d.role).unwrap_or(DeviceRole::Unknown);
        edge.tier = EdgeTier::infer(role_a, role_b);
    }
}

pub fn require_known_role(device: &Device) -> Result<(), Error> {
    if device.role == DeviceRole::Unknown {
        Err(Error::UnknownRole {
            device: device.name.clone(),
        })
    } else {
        Ok(())
    }
}
