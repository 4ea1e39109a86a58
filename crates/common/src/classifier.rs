//! Classifier (C5) — assigns exactly one `BridgeDomainTemplate` per
//! fragment by evaluating the ordered rule cascade of spec.md §4.5. A pure
//! function: identical inputs always produce identical outputs (property
//! P3).

use crate::types::{BdFragment, BridgeDomainTemplate, VlanExpr};

#[derive(Debug, Clone)]
pub struct ClassificationDiagnostic {
    pub rule_violated: String,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub template: BridgeDomainTemplate,
    pub diagnostics: Vec<ClassificationDiagnostic>,
}

/// Pure classification function, spec.md §4.5's six-rule ordered cascade.
pub fn classify(fragment: &BdFragment) -> ClassificationResult {
    let mut diagnostics = Vec::new();

    if fragment.members.is_empty() {
        diagnostics.push(ClassificationDiagnostic {
            rule_violated: "all".to_string(),
            detail: "fragment has no member interfaces".to_string(),
        });
        return ClassificationResult {
            template: BridgeDomainTemplate::Unclassified,
            diagnostics,
        };
    }

    // Rule 1: every member has vlan-id N and push/pop of a single outer
    // tag at the edge.
    let all_single_with_edge_imposition = fragment.members.iter().all(|m| {
        matches!(m.vlan.expr, VlanExpr::Single(_)) && (m.vlan.push.len() == 1 || m.vlan.pop_count == 1)
    });
    if all_single_with_edge_imposition && fragment.members.iter().any(|m| !m.vlan.push.is_empty() || m.vlan.pop_count > 0) {
        return ClassificationResult {
            template: BridgeDomainTemplate::DoubleTaggedEdgeImposition,
            diagnostics,
        };
    }

    // Rule 2: members use vlan-id N with no manipulation on uplinks, and
    // the edge pushes a second tag on the leaf. We approximate "uplink vs
    // edge" by checking that at least one member carries a push while
    // another of the same vlan id carries none.
    let single_ids: Vec<u16> = fragment
        .members
        .iter()
        .filter_map(|m| match m.vlan.expr {
            VlanExpr::Single(v) => Some(v),
            _ => None,
        })
        .collect();
    let any_push = fragment.members.iter().any(|m| !m.vlan.push.is_empty());
    let any_bare = fragment
        .members
        .iter()
        .any(|m| matches!(m.vlan.expr, VlanExpr::Single(_)) && m.vlan.push.is_empty() && m.vlan.pop_count == 0);
    if !single_ids.is_empty() && single_ids.len() == fragment.members.len() && any_push && any_bare {
        return ClassificationResult {
            template: BridgeDomainTemplate::DoubleTaggedLeafImposition,
            diagnostics,
        };
    }

    // Rule 3: full 1-4094 exposure.
    if fragment
        .members
        .iter()
        .all(|m| matches!(m.vlan.expr, VlanExpr::Full1To4094))
    {
        return ClassificationResult {
            template: BridgeDomainTemplate::QinqAll,
            diagnostics,
        };
    }

    // Rule 4: single id across the whole fragment, no manipulation.
    if !single_ids.is_empty()
        && single_ids.len() == fragment.members.len()
        && single_ids.iter().all(|v| *v == single_ids[0])
        && !any_push
        && fragment.members.iter().all(|m| m.vlan.pop_count == 0)
    {
        return ClassificationResult {
            template: BridgeDomainTemplate::SingleTagged,
            diagnostics,
        };
    }

    // Rule 5: list or disjoint ranges.
    if fragment
        .members
        .iter()
        .any(|m| matches!(m.vlan.expr, VlanExpr::List(_) | VlanExpr::Range(_, _)))
    {
        return ClassificationResult {
            template: BridgeDomainTemplate::SingleTaggedRangeList,
            diagnostics,
        };
    }

    // Rule 6: port-mode (no tagging at all) vs unclassified.
    let all_untagged = fragment
        .members
        .iter()
        .all(|m| m.vlan.expr == VlanExpr::Single(0) && m.vlan.push.is_empty() && m.vlan.pop_count == 0);
    if all_untagged {
        return ClassificationResult {
            template: BridgeDomainTemplate::PortMode,
            diagnostics,
        };
    }

    diagnostics.push(ClassificationDiagnostic {
        rule_violated: "all".to_string(),
        detail: "no classification rule matched this fragment's VLAN semantics".to_string(),
    });
    ClassificationResult {
        template: BridgeDomainTemplate::Unclassified,
        diagnostics,
    }
}
