//! The five coverage digests derived from one `EXPLAIN` plan: a full
//! fingerprint of the normalized text, a shape digest in traversal order,
//! an operator-signature digest (multiset of operator kinds), the ordered
//! join-operator sequence, and a join-graph digest.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::normalize::normalize_plan_text;
use crate::plan::{parse_explain_text, PlanNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanDigests {
    pub full: u64,
    pub shape: u64,
    pub operator_signature: u64,
    pub join_sequence: u64,
    pub join_graph: u64,
    pub has_join: bool,
    pub has_aggregate: bool,
}

fn hash_str(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

/// Computes the digests that drive [`crate::qpg::QpgTracker`] and
/// [`crate::kqe::KqeTracker`] from one `EXPLAIN` plan's text.
pub fn compute_digests(explain_text: &str) -> PlanDigests {
    let normalized = normalize_plan_text(explain_text);
    let nodes = parse_explain_text(&normalized);

    let full = hash_str(&normalized);
    let shape = hash_str(&shape_string(&nodes));
    let operator_signature = hash_str(&operator_signature_string(&nodes));
    let join_sequence = hash_str(&join_sequence_string(&nodes));
    let join_graph = hash_str(&join_graph_string(&nodes));
    let has_join = nodes.iter().any(|n| n.is_join);
    let has_aggregate = nodes.iter().any(|n| n.is_aggregate);

    PlanDigests {
        full,
        shape,
        operator_signature,
        join_sequence,
        join_graph,
        has_join,
        has_aggregate,
    }
}

fn shape_string(nodes: &[PlanNode]) -> String {
    nodes
        .iter()
        .map(|n| format!("{}:{}", n.depth, n.operator))
        .collect::<Vec<_>>()
        .join(";")
}

fn operator_signature_string(nodes: &[PlanNode]) -> String {
    let mut operators: Vec<&str> = nodes.iter().map(|n| n.operator.as_str()).collect();
    operators.sort_unstable();
    operators.join(",")
}

fn join_sequence_string(nodes: &[PlanNode]) -> String {
    nodes
        .iter()
        .filter(|n| n.is_join)
        .map(|n| n.operator.as_str())
        .collect::<Vec<_>>()
        .join(">")
}

/// A coarse join-graph digest: the ordered `(depth, operator)` pairs of
/// join nodes, approximating how the joins are nested relative to each
/// other. A full join-graph (which table joins which, on what key) would
/// need a richer generator than this crate depends on.
fn join_graph_string(nodes: &[PlanNode]) -> String {
    nodes
        .iter()
        .filter(|n| n.is_join)
        .map(|n| format!("{}@{}", n.operator, n.depth))
        .collect::<Vec<_>>()
        .join("|")
}
