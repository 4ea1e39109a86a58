//! Path Engine (C7) — computes device-level paths for P2P and P2MP build
//! intents over a `TopologySnapshot`. Spec.md §4.7.

use crate::error::Error;
use crate::topology::TopologySnapshot;
use crate::types::{P2mpStrategy, ServiceEndpoint};
use petgraph::algo::astar;
use std::collections::HashMap;

/// Per-spine interface budget used for shared-spine load balancing. Not an
/// actual hardware capacity figure — a soft ceiling on how many services a
/// single spine may carry before the path engine spills to another one.
pub const DEFAULT_SPINE_SERVICE_CAPACITY: usize = 512;

#[derive(Debug, Clone)]
pub struct DevicePath {
    pub destination: ServiceEndpoint,
    pub devices: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SpineUtilization {
    counts: HashMap<String, usize>,
}

impl SpineUtilization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, spine: &str) {
        *self.counts.entry(spine.to_string()).or_insert(0) += 1;
    }

    pub fn count(&self, spine: &str) -> usize {
        self.counts.get(spine).copied().unwrap_or(0)
    }
}

/// Shortest device-level path between two devices.
fn shortest_path(snapshot: &TopologySnapshot, from: &str, to: &str) -> Option<Vec<String>> {
    let start = *snapshot.node_index().get(from)?;
    let goal = *snapshot.node_index().get(to)?;
    let (_, path) = astar(
        snapshot.graph(),
        start,
        |n| n == goal,
        |_| 1u32,
        |_| 0u32,
    )?;
    Some(path.into_iter().map(|idx| snapshot.graph()[idx].clone()).collect())
}

/// Picks the spine from `candidates` with the lowest recorded utilization,
/// breaking ties by name for determinism.
fn least_utilized_spine<'a>(candidates: &[&'a str], util: &SpineUtilization) -> Option<&'a str> {
    candidates
        .iter()
        .min_by(|a, b| util.count(a).cmp(&util.count(b)).then_with(|| a.cmp(b)))
        .copied()
}

/// Spines directly adjacent to both `source` and `dest` — the 2-tier
/// leaf→spine→leaf candidates for a P2P or P2MP destination.
fn two_tier_spines(snapshot: &TopologySnapshot, source: &str, dest: &str) -> Vec<String> {
    snapshot
        .spines()
        .iter()
        .filter(|s| snapshot.edge_between(source, &s.name).is_some() && snapshot.edge_between(&s.name, dest).is_some())
        .map(|s| s.name.clone())
        .collect()
}

/// Computes a single point-to-point path (spec.md §4.7 P2P): prefers a
/// 2-tier leaf→spine→leaf route, breaking ties among equally-qualified
/// spines by lowest recorded utilization in `util`; falls back to a plain
/// shortest path (picking up 3-tier-via-superspine routes) when no direct
/// spine connects both ends. Errors with `NoPath` if unreachable.
pub fn compute_p2p_path(
    snapshot: &TopologySnapshot,
    source: &str,
    destination: &ServiceEndpoint,
    util: &mut SpineUtilization,
) -> Result<DevicePath, Error> {
    let candidates = two_tier_spines(snapshot, source, &destination.device);
    let candidate_refs: Vec<&str> = candidates.iter().map(|s| s.as_str()).collect();
    if let Some(chosen) = least_utilized_spine(&candidate_refs, util) {
        let chosen = chosen.to_string();
        util.record(&chosen);
        return Ok(DevicePath {
            destination: destination.clone(),
            devices: vec![source.to_string(), chosen, destination.device.clone()],
        });
    }

    let devices = shortest_path(snapshot, source, &destination.device).ok_or_else(|| Error::NoPath {
        destination: destination.device.clone(),
    })?;
    Ok(DevicePath {
        destination: destination.clone(),
        devices,
    })
}

/// Number of hops on the shortest path between two devices, or `None` if
/// unreachable.
fn hop_distance(snapshot: &TopologySnapshot, from: &str, to: &str) -> Option<usize> {
    shortest_path(snapshot, from, to).map(|p| p.len() - 1)
}

/// Greedy set-cover (spec.md §4.7 SHARED_SPINE): repeatedly picks the
/// transit device from `candidates` that sits exactly `hops` away from
/// `source` and covers the most not-yet-covered destinations (also exactly
/// `hops` away), assigns it those destinations, and repeats until every
/// destination is covered or none of `candidates` covers any of what
/// remains (`NoPath`). `hops` is 1 for a spine directly off the source
/// (SHARED_SPINE, HYBRID's 2-tier leg) and 2 for a superspine reached
/// through one intervening spine (HYBRID's 3-tier remainder) — without this
/// bound, a full-graph shortest path would "cover" a destination through an
/// unrelated transit device, defeating the point of sharing one. Ties are
/// broken by transit name for determinism. The per-destination path is then
/// built through its assigned transit, with the capacity cap re-checked
/// before every `util.record` so a transit that fills up over the loop
/// still trips `CapacityExceeded` (property P9).
fn greedy_transit_assign(
    snapshot: &TopologySnapshot,
    source: &str,
    destinations: &[&ServiceEndpoint],
    candidates: &[String],
    util: &mut SpineUtilization,
    capacity: usize,
    hops: usize,
) -> Result<Vec<DevicePath>, Error> {
    let mut remaining: Vec<&ServiceEndpoint> = destinations.to_vec();
    let mut assignment: HashMap<String, String> = HashMap::new();

    while !remaining.is_empty() {
        let mut best: Option<(&str, Vec<usize>)> = None;
        for candidate in candidates {
            if hop_distance(snapshot, source, candidate) != Some(hops) {
                continue;
            }
            let covered: Vec<usize> = remaining
                .iter()
                .enumerate()
                .filter(|(_, d)| hop_distance(snapshot, candidate, &d.device) == Some(hops))
                .map(|(i, _)| i)
                .collect();
            if covered.is_empty() {
                continue;
            }
            let take = match &best {
                None => true,
                Some((best_candidate, best_covered)) => {
                    covered.len() > best_covered.len()
                        || (covered.len() == best_covered.len() && candidate.as_str() < *best_candidate)
                }
            };
            if take {
                best = Some((candidate.as_str(), covered));
            }
        }

        let Some((chosen, covered_idxs)) = best else {
            return Err(Error::NoPath {
                destination: remaining[0].device.clone(),
            });
        };
        let covered_set: std::collections::HashSet<usize> = covered_idxs.iter().copied().collect();
        for &idx in &covered_idxs {
            assignment.insert(remaining[idx].device.clone(), chosen.to_string());
        }
        remaining = remaining
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !covered_set.contains(i))
            .map(|(_, d)| d)
            .collect();
    }

    let mut paths = Vec::with_capacity(destinations.len());
    for dest in destinations {
        let transit = assignment
            .get(&dest.device)
            .expect("set-cover loop assigns every destination before returning");
        if util.count(transit) >= capacity {
            return Err(Error::CapacityExceeded { spine: transit.clone() });
        }
        let via_source = shortest_path(snapshot, source, transit)
            .ok_or_else(|| Error::NoPath { destination: transit.clone() })?;
        let via_dest = shortest_path(snapshot, transit, &dest.device)
            .ok_or_else(|| Error::NoPath { destination: dest.device.clone() })?;
        let mut devices = via_source;
        devices.extend(via_dest.into_iter().skip(1));
        util.record(transit);
        paths.push(DevicePath {
            destination: (*dest).clone(),
            devices,
        });
    }

    Ok(paths)
}

/// Computes paths for every destination in a P2MP intent under the given
/// strategy (spec.md §4.7):
/// - SharedSpine: greedy set-cover over all spines reachable from the
///   source, minimizing the total number of spines used.
/// - Hybrid: SHARED_SPINE set-cover for destinations reachable via a spine
///   directly connected to the source; the remainder routes 3-tier through
///   a superspine, chosen by the same set-cover rule over superspines.
/// - Manual: uses `manual_paths` to pin the transit device per destination.
pub fn compute_p2mp_paths(
    snapshot: &TopologySnapshot,
    source: &str,
    destinations: &[ServiceEndpoint],
    strategy: P2mpStrategy,
    manual_paths: &HashMap<String, String>,
    spine_capacity: usize,
) -> Result<Vec<DevicePath>, Error> {
    let mut util = SpineUtilization::new();
    let mut paths = Vec::new();

    match strategy {
        P2mpStrategy::SharedSpine => {
            let spine_names: Vec<String> = snapshot.spines().iter().map(|d| d.name.clone()).collect();
            let dest_refs: Vec<&ServiceEndpoint> = destinations.iter().collect();
            paths =
                greedy_transit_assign(snapshot, source, &dest_refs, &spine_names, &mut util, spine_capacity, 1)?;
        }
        P2mpStrategy::Hybrid => {
            let spine_names: Vec<String> = snapshot.spines().iter().map(|d| d.name.clone()).collect();
            let superspine_names: Vec<String> =
                snapshot.superspines().iter().map(|d| d.name.clone()).collect();

            let (two_tier, remainder): (Vec<&ServiceEndpoint>, Vec<&ServiceEndpoint>) =
                destinations.iter().partition(|d| {
                    spine_names
                        .iter()
                        .any(|s| hop_distance(snapshot, source, s) == Some(1) && hop_distance(snapshot, s, &d.device) == Some(1))
                });

            let mut result =
                greedy_transit_assign(snapshot, source, &two_tier, &spine_names, &mut util, spine_capacity, 1)?;
            let via_superspine = greedy_transit_assign(
                snapshot,
                source,
                &remainder,
                &superspine_names,
                &mut util,
                spine_capacity,
                2,
            )?;
            result.extend(via_superspine);
            paths = result;
        }
        P2mpStrategy::Manual => {
            for dest in destinations {
                let transit = manual_paths.get(&dest.device).ok_or_else(|| Error::NoPath {
                    destination: dest.device.clone(),
                })?;
                let via_source = shortest_path(snapshot, source, transit)
                    .ok_or_else(|| Error::NoPath { destination: transit.clone() })?;
                let via_dest = shortest_path(snapshot, transit, &dest.device)
                    .ok_or_else(|| Error::NoPath { destination: dest.device.clone() })?;
                let mut devices = via_source;
                devices.extend(via_dest.into_iter().skip(1));
                paths.push(DevicePath { destination: dest.clone(), devices });
            }
        }
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_command_output, CommandKind};
    use crate::topology::TopologyBuilder;
    use crate::types::Device;

    fn fabric() -> TopologySnapshot {
        let mut builder = TopologyBuilder::new();
        builder.add_device(Device::new("leaf-a", "10.0.0.1"));
        builder.add_device(Device::new("leaf-b", "10.0.0.2"));
        builder.add_device(Device::new("spine-1", "10.0.0.3"));

        let mut a = crate::parser::DeviceParseReport::default();
        parse_command_output("leaf-a", CommandKind::LldpNeighbor, "ge1 spine-1 ge1 lldp", &mut a);
        builder.ingest("leaf-a", &a);

        let mut b = crate::parser::DeviceParseReport::default();
        parse_command_output("leaf-b", CommandKind::LldpNeighbor, "ge1 spine-1 ge2 lldp", &mut b);
        builder.ingest("leaf-b", &b);

        let mut s = crate::parser::DeviceParseReport::default();
        parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge1 leaf-a ge1 lldp", &mut s);
        parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge2 leaf-b ge1 lldp", &mut s);
        builder.ingest("spine-1", &s);

        builder.build()
    }

    #[test]
    fn p2p_path_runs_through_the_shared_spine() {
        let snap = fabric();
        let dest = ServiceEndpoint { device: "leaf-b".to_string(), interface: "ge1.100".to_string() };
        let mut util = SpineUtilization::new();
        let path = compute_p2p_path(&snap, "leaf-a", &dest, &mut util).unwrap();
        assert_eq!(path.devices, vec!["leaf-a".to_string(), "spine-1".to_string(), "leaf-b".to_string()]);
    }

    #[test]
    fn unreachable_destination_is_no_path() {
        let snap = fabric();
        let dest = ServiceEndpoint { device: "leaf-z".to_string(), interface: "ge1.100".to_string() };
        let mut util = SpineUtilization::new();
        let err = compute_p2p_path(&snap, "leaf-a", &dest, &mut util).unwrap_err();
        assert!(matches!(err, Error::NoPath { .. }));
    }

    #[test]
    fn p2p_tie_break_prefers_least_utilized_spine() {
        let mut builder = TopologyBuilder::new();
        for name in ["leaf-a", "leaf-b", "spine-1", "spine-2"] {
            builder.add_device(Device::new(name, format!("10.0.2.{}", name.len())));
        }
        let mut a = crate::parser::DeviceParseReport::default();
        parse_command_output("leaf-a", CommandKind::LldpNeighbor, "ge1 spine-1 ge1 lldp", &mut a);
        parse_command_output("leaf-a", CommandKind::LldpNeighbor, "ge2 spine-2 ge1 lldp", &mut a);
        builder.ingest("leaf-a", &a);
        let mut b = crate::parser::DeviceParseReport::default();
        parse_command_output("leaf-b", CommandKind::LldpNeighbor, "ge1 spine-1 ge2 lldp", &mut b);
        parse_command_output("leaf-b", CommandKind::LldpNeighbor, "ge2 spine-2 ge2 lldp", &mut b);
        builder.ingest("leaf-b", &b);
        let mut s1 = crate::parser::DeviceParseReport::default();
        parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge1 leaf-a ge1 lldp", &mut s1);
        parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge2 leaf-b ge1 lldp", &mut s1);
        builder.ingest("spine-1", &s1);
        let mut s2 = crate::parser::DeviceParseReport::default();
        parse_command_output("spine-2", CommandKind::LldpNeighbor, "ge1 leaf-a ge2 lldp", &mut s2);
        parse_command_output("spine-2", CommandKind::LldpNeighbor, "ge2 leaf-b ge2 lldp", &mut s2);
        builder.ingest("spine-2", &s2);
        let snap = builder.build();

        let dest = ServiceEndpoint { device: "leaf-b".to_string(), interface: "ge1.100".to_string() };
        let mut util = SpineUtilization::new();
        util.record("spine-1");
        let path = compute_p2p_path(&snap, "leaf-a", &dest, &mut util).unwrap();
        assert!(path.devices.contains(&"spine-2".to_string()));
    }

    #[test]
    fn shared_spine_p2mp_routes_all_destinations_through_one_spine() {
        let snap = fabric();
        let dest = ServiceEndpoint { device: "leaf-b".to_string(), interface: "ge1.100".to_string() };
        let paths = compute_p2mp_paths(
            &snap,
            "leaf-a",
            &[dest],
            P2mpStrategy::SharedSpine,
            &HashMap::new(),
            DEFAULT_SPINE_SERVICE_CAPACITY,
        )
        .unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].devices.contains(&"spine-1".to_string()));
    }

    #[test]
    fn shared_spine_capacity_is_enforced_across_the_whole_destination_list() {
        let mut builder = TopologyBuilder::new();
        for name in ["leaf-a", "leaf-b", "leaf-c", "spine-1"] {
            builder.add_device(Device::new(name, format!("10.0.6.{}", name.len())));
        }
        let mut a = crate::parser::DeviceParseReport::default();
        parse_command_output("leaf-a", CommandKind::LldpNeighbor, "ge1 spine-1 ge1 lldp", &mut a);
        builder.ingest("leaf-a", &a);
        let mut b = crate::parser::DeviceParseReport::default();
        parse_command_output("leaf-b", CommandKind::LldpNeighbor, "ge1 spine-1 ge2 lldp", &mut b);
        builder.ingest("leaf-b", &b);
        let mut c = crate::parser::DeviceParseReport::default();
        parse_command_output("leaf-c", CommandKind::LldpNeighbor, "ge1 spine-1 ge3 lldp", &mut c);
        builder.ingest("leaf-c", &c);
        let mut s = crate::parser::DeviceParseReport::default();
        parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge1 leaf-a ge1 lldp", &mut s);
        parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge2 leaf-b ge1 lldp", &mut s);
        parse_command_output("spine-1", CommandKind::LldpNeighbor, "ge3 leaf-c ge1 lldp", &mut s);
        builder.ingest("spine-1", &s);
        let snap = builder.build();

        let dest_b = ServiceEndpoint { device: "leaf-b".to_string(), interface: "ge1".to_string() };
        let dest_c = ServiceEndpoint { device: "leaf-c".to_string(), interface: "ge1".to_string() };

        let err = compute_p2mp_paths(
            &snap,
            "leaf-a",
            &[dest_b, dest_c],
            P2mpStrategy::SharedSpine,
            &HashMap::new(),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { .. }));
    }
}
