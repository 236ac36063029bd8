//! KQE-lite: a smaller coverage sibling to QPG that tracks only the
//! join-type sequence and join-graph digests, raising the join-count bias
//! when either one stalls. Cheaper to run per-query than full QPG, at the
//! cost of being blind to shape/operator-signature coverage.

use std::collections::HashSet;

use crate::digest::compute_digests;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KqeOverride {
    pub join_count: Option<u32>,
    remaining_ttl: u32,
}

impl KqeOverride {
    pub fn is_active(&self) -> bool {
        self.remaining_ttl > 0
    }

    pub fn tick(&mut self) {
        if self.remaining_ttl > 0 {
            self.remaining_ttl -= 1;
            if self.remaining_ttl == 0 {
                *self = Self::default();
            }
        }
    }
}

pub struct KqeTracker {
    seen_join_type: HashSet<u64>,
    seen_join_graph: HashSet<u64>,
    no_new_join_type: u64,
    no_new_join_graph: u64,
    plateau: u64,
    override_ttl: u32,
    state: KqeOverride,
}

impl KqeTracker {
    pub fn new(plateau: u64, override_ttl: u32) -> Self {
        Self {
            seen_join_type: HashSet::new(),
            seen_join_graph: HashSet::new(),
            no_new_join_type: 0,
            no_new_join_graph: 0,
            plateau,
            override_ttl,
            state: KqeOverride::default(),
        }
    }

    /// Distinct join-type sequences seen so far; reported alongside QPG's
    /// `unique_plan_count` in the periodic state snapshot.
    pub fn unique_plan_count(&self) -> usize {
        self.seen_join_type.len()
    }

    pub fn observe(&mut self, explain_text: &str) {
        let digests = compute_digests(explain_text);

        if self.seen_join_type.insert(digests.join_sequence) {
            self.no_new_join_type = 0;
        } else {
            self.no_new_join_type += 1;
        }
        if self.seen_join_graph.insert(digests.join_graph) {
            self.no_new_join_graph = 0;
        } else {
            self.no_new_join_graph += 1;
        }

        if self.no_new_join_type >= self.plateau || self.no_new_join_graph >= self.plateau {
            self.state = KqeOverride {
                join_count: Some(self.state.join_count.unwrap_or(1).max(1) + 1),
                remaining_ttl: self.override_ttl,
            };
        }
    }

    pub fn active_override(&self) -> Option<KqeOverride> {
        self.state.is_active().then_some(self.state)
    }

    pub fn tick_override(&mut self) {
        self.state.tick();
    }
}

impl Default for KqeTracker {
    fn default() -> Self {
        Self::new(100, 20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_stalled_join_sequence_raises_join_count() {
        let mut tracker = KqeTracker::new(3, 2);
        for i in 0..5 {
            tracker.observe(&format!("TableReader_{i} root data:TableFullScan_{i}"));
        }
        let over = tracker.active_override().unwrap();
        assert!(over.join_count.unwrap() >= 2);
    }

    #[test]
    fn varied_join_shapes_never_plateau() {
        let mut tracker = KqeTracker::new(3, 2);
        tracker.observe("HashJoin_1 root\n├─TableReader_2 root\n└─TableReader_3 root");
        tracker.observe("MergeJoin_1 root\n├─TableReader_2 root\n└─TableReader_3 root");
        tracker.observe("IndexJoin_1 root\n├─TableReader_2 root\n└─TableReader_3 root");
        assert!(tracker.active_override().is_none());
    }
}
