//! Core data model: devices, interfaces, fragments, services, intents.
//!
//! Every record is an explicit, validating struct — see spec.md §3. None of
//! these types are ever passed around as untyped JSON between engines; only
//! the persistence and RPC boundaries serialize them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Inferred fabric tier for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    Leaf,
    Spine,
    Superspine,
    Unknown,
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceRole::Leaf => write!(f, "leaf"),
            DeviceRole::Spine => write!(f, "spine"),
            DeviceRole::Superspine => write!(f, "superspine"),
            DeviceRole::Unknown => write!(f, "unknown"),
        }
    }
}

/// The rule that produced a role inference, kept for traceability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleInferenceRule {
    NamePrefix,
    NeighborDegree,
    MajorityVote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleInference {
    pub role: DeviceRole,
    pub confidence: f64,
    pub rule: RoleInferenceRule,
}

/// A device's reachability as of the last discovery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachabilityState {
    Reachable,
    Unreachable,
    PartialDiscovery,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub mgmt_addr: String,
    pub role: DeviceRole,
    pub role_inference: Option<RoleInference>,
    pub tags: Vec<String>,
    pub reachability: ReachabilityState,
}

impl Device {
    pub fn new(name: impl Into<String>, mgmt_addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mgmt_addr: mgmt_addr.into(),
            role: DeviceRole::Unknown,
            role_inference: None,
            tags: Vec::new(),
            reachability: ReachabilityState::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    Physical,
    Bundle,
    Subinterface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceRole {
    Access,
    Uplink,
    Downlink,
    Transport,
    Unknown,
}

/// A reference to an interface on a specific device, the unit edges and
/// fragment members are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceRef {
    pub device: String,
    pub name: String,
}

impl InterfaceRef {
    pub fn new(device: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for InterfaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interface {
    pub device: String,
    pub name: String,
    pub kind: InterfaceKind,
    /// For SUBINTERFACE/BUNDLE-member interfaces: the owning parent.
    pub parent: Option<InterfaceRef>,
    pub admin_up: bool,
    pub role: InterfaceRole,
}

impl Interface {
    /// Validates the invariants of spec.md §3: a SUBINTERFACE must carry a
    /// parent; a BUNDLE never does. PHYSICAL interfaces may optionally
    /// carry a parent when they are bundle members.
    pub fn validate(&self) -> Result<(), String> {
        match self.kind {
            InterfaceKind::Subinterface if self.parent.is_none() => Err(format!(
                "subinterface {}:{} has no parent",
                self.device, self.name
            )),
            InterfaceKind::Bundle if self.parent.is_some() => Err(format!(
                "bundle {}:{} carries a parent",
                self.device, self.name
            )),
            _ => Ok(()),
        }
    }

    pub fn as_ref(&self) -> InterfaceRef {
        InterfaceRef::new(self.device.clone(), self.name.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeTier {
    LeafSpine,
    SpineSuperspine,
    Other,
}

impl EdgeTier {
    pub fn infer(a: DeviceRole, b: DeviceRole) -> Self {
        use DeviceRole::*;
        match (a, b) {
            (Leaf, Spine) | (Spine, Leaf) => EdgeTier::LeafSpine,
            (Spine, Superspine) | (Superspine, Spine) => EdgeTier::SpineSuperspine,
            _ => EdgeTier::Other,
        }
    }
}

/// A bidirectional, deduplicated link between two device interfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborEdge {
    pub a: InterfaceRef,
    pub b: InterfaceRef,
    pub tier: EdgeTier,
}

impl NeighborEdge {
    /// Canonical ordering so (a, b) and (b, a) dedupe to the same edge.
    pub fn canonical_key(&self) -> (InterfaceRef, InterfaceRef) {
        if (self.a.device.as_str(), self.a.name.as_str())
            <= (self.b.device.as_str(), self.b.name.as_str())
        {
            (self.a.clone(), self.b.clone())
        } else {
            (self.b.clone(), self.a.clone())
        }
    }
}

/// A single VLAN tag value, 1-4094.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VlanTag(pub u16);

/// The VLAN expression attached to a fragment member or a build intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VlanExpr {
    Single(u16),
    List(Vec<u16>),
    Range(u16, u16),
    Full1To4094,
}

impl VlanExpr {
    /// The lowest VLAN id in this expression, used as the bucket key.
    pub fn primary(&self) -> u16 {
        match self {
            VlanExpr::Single(v) => *v,
            VlanExpr::List(vs) => vs.iter().copied().min().unwrap_or(0),
            VlanExpr::Range(lo, _) => *lo,
            VlanExpr::Full1To4094 => 1,
        }
    }

    /// Whether `other` is a compatible subset/equal expression for
    /// consolidation purposes (spec.md §4.6 merge rule ii).
    pub fn compatible_with(&self, other: &VlanExpr) -> bool {
        match (self, other) {
            (VlanExpr::Single(a), VlanExpr::Single(b)) => a == b,
            (VlanExpr::Full1To4094, VlanExpr::Full1To4094) => true,
            (VlanExpr::Range(lo1, hi1), VlanExpr::Range(lo2, hi2)) => {
                lo1 == lo2 && hi1 == hi2
            }
            (VlanExpr::List(a), VlanExpr::List(b)) => {
                let sa: std::collections::BTreeSet<_> = a.iter().collect();
                let sb: std::collections::BTreeSet<_> = b.iter().collect();
                sa == sb || sa.is_subset(&sb) || sb.is_subset(&sa)
            }
            _ => false,
        }
    }
}

impl fmt::Display for VlanExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VlanExpr::Single(v) => write!(f, "{v}"),
            VlanExpr::List(vs) => write!(
                f,
                "{}",
                vs.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",")
            ),
            VlanExpr::Range(lo, hi) => write!(f, "{lo}-{hi}"),
            VlanExpr::Full1To4094 => write!(f, "1-4094"),
        }
    }
}

/// Per-interface-in-fragment VLAN manipulation (spec.md §3 VLANSemantics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlanSemantics {
    pub expr: VlanExpr,
    pub push: Vec<VlanTag>,
    pub pop_count: u8,
    pub swaps: Vec<(VlanTag, VlanTag)>,
}

impl VlanSemantics {
    pub fn untagged(expr: VlanExpr) -> Self {
        Self {
            expr,
            push: Vec::new(),
            pop_count: 0,
            swaps: Vec::new(),
        }
    }
}

/// A single member interface inside a BD fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentMember {
    pub iface: InterfaceRef,
    pub vlan: VlanSemantics,
}

/// One device's view of a bridge domain (spec.md §3 BDFragment). Immutable
/// per discovery snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BdFragment {
    pub device: String,
    pub bd_name: String,
    pub members: Vec<FragmentMember>,
    pub admin_up: bool,
    pub snapshot_id: u64,
    /// Set when the BD instance exists but carries no member interfaces.
    pub empty: bool,
}

impl BdFragment {
    pub fn id(&self) -> FragmentId {
        FragmentId {
            device: self.device.clone(),
            bd_name: self.bd_name.clone(),
        }
    }
}

/// Stable sort/identity key for a fragment (spec.md §4.6 determinism rule).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FragmentId {
    pub device: String,
    pub bd_name: String,
}

/// The VLAN-semantics classification tag assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BridgeDomainTemplate {
    SingleTagged,
    SingleTaggedRangeList,
    DoubleTaggedEdgeImposition,
    DoubleTaggedLeafImposition,
    QinqAll,
    PortMode,
    Unclassified,
}

impl fmt::Display for BridgeDomainTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BridgeDomainTemplate::SingleTagged => "SINGLE_TAGGED",
            BridgeDomainTemplate::SingleTaggedRangeList => "SINGLE_TAGGED_RANGE/LIST",
            BridgeDomainTemplate::DoubleTaggedEdgeImposition => "DOUBLE_TAGGED_EDGE_IMPOSITION",
            BridgeDomainTemplate::DoubleTaggedLeafImposition => "DOUBLE_TAGGED_LEAF_IMPOSITION",
            BridgeDomainTemplate::QinqAll => "QINQ_ALL",
            BridgeDomainTemplate::PortMode => "PORT_MODE",
            BridgeDomainTemplate::Unclassified => "UNCLASSIFIED",
        };
        write!(f, "{s}")
    }
}

/// The consolidation identity key (spec.md §3 ServiceSignature).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSignature {
    pub service_name: Option<String>,
    pub vlan: VlanExpr,
    pub template: BridgeDomainTemplate,
    pub endpoint_fingerprint: String,
}

/// An endpoint leaf in a consolidated service: the leaf device plus the
/// access interface the service terminates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub device: String,
    pub interface: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeDomainService {
    pub name: String,
    pub template: BridgeDomainTemplate,
    pub vlan: VlanExpr,
    pub endpoints: Vec<ServiceEndpoint>,
    pub uplinks: Vec<InterfaceRef>,
    pub paths: Vec<Vec<String>>,
    pub confidence: f64,
    pub provenance: Vec<FragmentId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum P2mpStrategy {
    SharedSpine,
    Hybrid,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildIntent {
    pub service_name: String,
    pub template: BridgeDomainTemplate,
    pub vlan: VlanExpr,
    pub source: ServiceEndpoint,
    pub destinations: Vec<ServiceEndpoint>,
    pub strategy: P2mpStrategy,
    /// Only consulted when strategy == Manual: destination -> chosen spine.
    #[serde(default)]
    pub manual_paths: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliCommand(pub String);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfigChange {
    pub device: String,
    pub service_name: String,
    pub forward: Vec<CliCommand>,
    pub inverse: Vec<CliCommand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentState {
    Pending,
    Staged,
    CommitChecked,
    Committed,
    Verified,
    Failed,
    RolledBack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub intent: BuildIntent,
    pub per_device: HashMap<String, DeviceConfigChange>,
    pub device_state: HashMap<String, DeploymentState>,
    pub state: DeploymentState,
    pub history: Vec<(DeploymentState, i64)>,
    pub errors: HashMap<String, String>,
}

impl Deployment {
    pub fn new(id: String, intent: BuildIntent, per_device: HashMap<String, DeviceConfigChange>) -> Self {
        let device_state = per_device
            .keys()
            .map(|d| (d.clone(), DeploymentState::Pending))
            .collect();
        Self {
            id,
            intent,
            per_device,
            device_state,
            state: DeploymentState::Pending,
            history: Vec::new(),
            errors: HashMap::new(),
        }
    }
}

/// A diagnostic attached to a discovery snapshot or a build/deploy attempt;
/// these are never raised as panics, only accumulated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: String,
    pub message: String,
    pub device: Option<String>,
}

/// Persisted summary of a `TopologySnapshot` (the graph itself is rebuilt
/// from fragments/devices on load, not serialized directly).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshotRecord {
    pub device_count: usize,
    pub edge_count: usize,
    pub half_edge_anomaly_count: usize,
}
