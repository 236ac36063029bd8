//! A minimal structural parse of an `EXPLAIN` plan's tree, enough to
//! derive the five coverage digests. Real plan output is tabular and
//! engine-specific; this keeps only what the digests need (indentation
//! depth and an operator label per line) rather than modeling every
//! column `EXPLAIN` prints.

const TREE_PREFIX_CHARS: [char; 4] = ['├', '└', '│', '─'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanNode {
    pub depth: usize,
    /// Operator label with its `_<id>` suffix stripped, e.g. `TableReader`.
    pub operator: String,
    pub is_join: bool,
    pub is_aggregate: bool,
}

fn strip_operator_id(label: &str) -> &str {
    match label.rfind('_') {
        Some(idx) if label[idx + 1..].bytes().all(|b| b.is_ascii_digit()) && idx + 1 < label.len() => &label[..idx],
        _ => label,
    }
}

fn line_depth_and_rest(line: &str) -> (usize, &str) {
    let prefix_len = line
        .chars()
        .take_while(|c| TREE_PREFIX_CHARS.contains(c) || *c == ' ')
        .count();
    let byte_offset = line
        .char_indices()
        .nth(prefix_len)
        .map_or(line.len(), |(i, _)| i);
    // Each nesting level in the tree-drawing prefix is two characters wide.
    (prefix_len / 2, &line[byte_offset..])
}

/// Parses an `EXPLAIN`/`EXPLAIN FORMAT=...` text blob into a flat,
/// depth-first list of plan nodes.
pub fn parse_explain_text(text: &str) -> Vec<PlanNode> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let (depth, rest) = line_depth_and_rest(line);
            let label = rest.split_whitespace().next().unwrap_or("");
            let operator = strip_operator_id(label).to_string();
            let is_join = operator.contains("Join");
            let is_aggregate = operator.contains("Agg");
            PlanNode {
                depth,
                operator,
                is_join,
                is_aggregate,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_scan_plan_parses_one_node_at_depth_zero() {
        let nodes = parse_explain_text("TableReader_7 10000.00 root data:TableFullScan_6");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].operator, "TableReader");
        assert_eq!(nodes[0].depth, 0);
    }

    #[test]
    fn nested_plan_increases_depth_per_level() {
        let text = "TableReader_7 root\n\
                     └─Selection_6 cop[tikv]\n\
                     \u{20}\u{20}└─TableFullScan_5 cop[tikv] table:t0";
        let nodes = parse_explain_text(text);
        assert_eq!(nodes.len(), 3);
        assert!(nodes[1].depth >= 1);
        assert!(nodes[2].depth >= nodes[1].depth);
    }

    #[test]
    fn join_and_aggregate_operators_are_flagged() {
        let nodes = parse_explain_text("HashJoin_9 root\n└─HashAgg_4 cop[tikv]");
        assert!(nodes[0].is_join);
        assert!(nodes[1].is_aggregate);
    }
}
