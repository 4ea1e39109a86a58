//! Consolidator (C6) — the hardest subsystem. Groups per-device BD
//! fragments with inconsistent, hand-edited names into coherent
//! `BridgeDomainService` records by service-signature identity.
//! Spec.md §4.6.

use crate::classifier::classify;
use crate::types::{
    BdFragment, BridgeDomainService, BridgeDomainTemplate, FragmentId, ServiceEndpoint, VlanExpr,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Consolidation is rejected below this score and instead emitted as a
/// separate per-fragment service plus a `LowConfidenceConsolidation`
/// diagnostic (spec.md §9 Open Question: kept configurable).
pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.55;

/// Normalized edit-distance threshold under which two canonical service
/// names are still considered equal for merge purposes.
pub const NAME_EDIT_DISTANCE_THRESHOLD: usize = 2;

#[derive(Debug, Clone)]
pub struct ConsolidationDiagnostic {
    pub service_name: String,
    pub kind: String,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct ConsolidationOutcome {
    pub services: Vec<BridgeDomainService>,
    pub diagnostics: Vec<ConsolidationDiagnostic>,
}

/// Ordered patterns tried against a lower-cased, separator-stripped BD
/// name to recover (username, vlan). Falls back to VLAN-only when no
/// username is extractable (spec.md §4.6 step 1).
static NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^g[_-]?(?P<user>[a-z0-9]+)[_-]?v(?P<vlan>\d{1,4})$").unwrap(),
        Regex::new(r"^(?P<user>[a-z0-9]+)[_-]?v(?P<vlan>\d{1,4})$").unwrap(),
        Regex::new(r"^(?P<user>[a-z0-9]+)(?P<vlan>\d{1,4})$").unwrap(),
    ]
});

fn strip_separators_lower(name: &str) -> String {
    name.to_lowercase().replace(['_', '-'], "")
}

/// Extracted identity candidate for one fragment.
#[derive(Debug, Clone)]
pub struct SignatureCandidate {
    pub fragment_id: FragmentId,
    pub username: Option<String>,
    pub vlan: VlanExpr,
    pub template: BridgeDomainTemplate,
}

/// Canonicalizes one fragment's BD name into a (username?, vlan) pair
/// using the ordered pattern list on the lower-cased, separator-stripped
/// name; falls back to VLAN-only if no username is extractable.
pub fn canonicalize(fragment: &BdFragment) -> SignatureCandidate {
    let stripped = strip_separators_lower(&fragment.bd_name);
    let vlan = fragment
        .members
        .first()
        .map(|m| m.vlan.expr.clone())
        .unwrap_or(VlanExpr::Single(0));
    let template = classify(fragment).template;

    for pat in NAME_PATTERNS.iter() {
        if let Some(caps) = pat.captures(&stripped) {
            if let Some(user) = caps.name("user") {
                return SignatureCandidate {
                    fragment_id: fragment.id(),
                    username: Some(user.as_str().to_string()),
                    vlan,
                    template,
                };
            }
        }
    }

    SignatureCandidate {
        fragment_id: fragment.id(),
        username: None,
        vlan,
        template,
    }
}

fn normalized_edit_distance(a: &str, b: &str) -> usize {
    let la = a.chars().count();
    let lb = b.chars().count();
    let mut dp = vec![vec![0usize; lb + 1]; la + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, cell) in dp[0].iter_mut().enumerate() {
        *cell = j;
    }
    let ac: Vec<char> = a.chars().collect();
    let bc: Vec<char> = b.chars().collect();
    for i in 1..=la {
        for j in 1..=lb {
            let cost = if ac[i - 1] == bc[j - 1] { 0 } else { 1 };
            dp[i][j] = (dp[i - 1][j] + 1).min(dp[i][j - 1] + 1).min(dp[i - 1][j - 1] + cost);
        }
    }
    dp[la][lb]
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            // earlier index wins as root, keeping iteration order stable
            if ra < rb {
                self.parent[rb] = ra;
            } else {
                self.parent[ra] = rb;
            }
        }
    }
}

/// MERGE iff (i) templates match or one is UNCLASSIFIED, (ii) VLAN
/// semantics are compatible, (iii) canonical names are equal/null-tolerant
/// or within edit-distance threshold with agreeing (username, vlan).
fn should_merge(a: &SignatureCandidate, b: &SignatureCandidate) -> bool {
    let templates_ok = a.template == b.template
        || a.template == BridgeDomainTemplate::Unclassified
        || b.template == BridgeDomainTemplate::Unclassified;
    if !templates_ok {
        return false;
    }
    if !a.vlan.compatible_with(&b.vlan) {
        return false;
    }
    match (&a.username, &b.username) {
        (None, _) | (_, None) => true,
        (Some(ua), Some(ub)) => {
            ua == ub || normalized_edit_distance(ua, ub) <= NAME_EDIT_DISTANCE_THRESHOLD
        }
    }
}

/// Scores a union: starts at 1.0, subtracts for each concession (template
/// mismatch among members, missing username, name disagreement).
fn score_union(candidates: &[&SignatureCandidate]) -> f64 {
    let mut score = 1.0f64;
    let base_template = candidates[0].template;
    if candidates.iter().any(|c| c.template != base_template) {
        score -= 0.2;
    }
    if candidates.iter().any(|c| c.username.is_none()) {
        score -= 0.15;
    }
    let distinct_names: std::collections::HashSet<_> =
        candidates.iter().filter_map(|c| c.username.as_deref()).collect();
    if distinct_names.len() > 1 {
        score -= 0.15 * (distinct_names.len() as f64 - 1.0);
    }
    score.clamp(0.0, 1.0)
}

fn most_common_name(candidates: &[&SignatureCandidate]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for c in candidates {
        if let Some(u) = &c.username {
            *counts.entry(u.as_str()).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(n, _)| n.to_string())
}

/// Runs the full consolidation pipeline: canonicalize, bucket, union-find,
/// score, emit. Deterministic regardless of input order (property P4):
/// fragments are sorted by `FragmentId` before union-find runs.
pub fn consolidate(fragments: &[BdFragment], confidence_floor: f64) -> ConsolidationOutcome {
    let mut sorted: Vec<&BdFragment> = fragments.iter().collect();
    sorted.sort_by_key(|a| a.id());

    let candidates: Vec<SignatureCandidate> = sorted.iter().map(|f| canonicalize(f)).collect();

    // Bucket by (template, primary vlan).
    let mut buckets: HashMap<(BridgeDomainTemplate, u16), Vec<usize>> = HashMap::new();
    for (idx, c) in candidates.iter().enumerate() {
        buckets
            .entry((c.template, c.vlan.primary()))
            .or_default()
            .push(idx);
    }

    let mut services = Vec::new();
    let mut diagnostics = Vec::new();

    let mut bucket_keys: Vec<_> = buckets.keys().cloned().collect();
    bucket_keys.sort();

    for key in bucket_keys {
        let members = &buckets[&key];
        let mut dsu = DisjointSet::new(members.len());
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                if should_merge(&candidates[members[i]], &candidates[members[j]]) {
                    dsu.union(i, j);
                }
            }
        }

        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for (i, &member) in members.iter().enumerate() {
            let root = dsu.find(i);
            groups.entry(root).or_default().push(member);
        }

        let mut group_roots: Vec<_> = groups.keys().cloned().collect();
        group_roots.sort();

        for root in group_roots {
            let member_idxs = &groups[&root];
            let group_candidates: Vec<&SignatureCandidate> =
                member_idxs.iter().map(|&i| &candidates[i]).collect();
            let score = score_union(&group_candidates);

            let provenance: Vec<FragmentId> =
                member_idxs.iter().map(|&i| candidates[i].fragment_id.clone()).collect();
            let name = most_common_name(&group_candidates)
                .map(|n| format!("g_{n}_v{}", candidates[member_idxs[0]].vlan.primary()))
                .unwrap_or_else(|| format!("v{}_unnamed", candidates[member_idxs[0]].vlan.primary()));

            if score < confidence_floor {
                diagnostics.push(ConsolidationDiagnostic {
                    service_name: name.clone(),
                    kind: "LowConfidenceConsolidation".to_string(),
                    detail: format!("union scored {score:.2}, below floor {confidence_floor:.2}"),
                });
            }

            let endpoints: Vec<ServiceEndpoint> = member_idxs
                .iter()
                .flat_map(|&i| {
                    sorted[i].members.iter().map(|m| ServiceEndpoint {
                        device: m.iface.device.clone(),
                        interface: m.iface.name.clone(),
                    })
                })
                .collect();

            services.push(BridgeDomainService {
                name,
                template: group_candidates[0].template,
                vlan: group_candidates[0].vlan.clone(),
                endpoints,
                uplinks: Vec::new(),
                paths: Vec::new(),
                confidence: score,
                provenance,
            });
        }
    }

    services.sort_by(|a, b| a.name.cmp(&b.name));
    ConsolidationOutcome { services, diagnostics }
}
