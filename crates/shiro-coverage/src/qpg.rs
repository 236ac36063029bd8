//! Query Plan Graph (QPG) coverage controller: tracks which normalized
//! plan shapes have been seen and, once coverage plateaus on any of its
//! seven staleness counters, emits a TTL'd generation-bias override so the
//! next queries explore a different corner of the plan space.

use std::collections::HashSet;

use crate::digest::{compute_digests, PlanDigests};

/// A TTL'd generation-bias override. Only one is ever active: a later
/// trigger overwrites the fields it names and resets the shared TTL,
/// leaving fields it doesn't name at whatever a prior trigger (or nothing)
/// left them at.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdaptiveWeights {
    pub join_count: Option<u32>,
    pub subquery_count: Option<u32>,
    pub aggregate_prob: Option<f64>,
    remaining_ttl: u32,
}

impl AdaptiveWeights {
    pub fn is_active(&self) -> bool {
        self.remaining_ttl > 0
    }

    /// Call once per generated query; expires the override when its TTL
    /// runs out.
    pub fn tick(&mut self) {
        if self.remaining_ttl > 0 {
            self.remaining_ttl -= 1;
            if self.remaining_ttl == 0 {
                *self = AdaptiveWeights::default();
            }
        }
    }

    fn overwrite(&mut self, ttl: u32, apply: impl FnOnce(&mut Self)) {
        apply(self);
        self.remaining_ttl = ttl;
    }
}

/// Per-counter plateau thresholds and the TTL applied to an override once
/// triggered. Defaults use a single round-number threshold shared across
/// the seven independent counters this controller tracks.
#[derive(Debug, Clone, Copy)]
pub struct QpgThresholds {
    pub plateau: u64,
    pub override_ttl: u32,
}

impl Default for QpgThresholds {
    fn default() -> Self {
        Self {
            plateau: 100,
            override_ttl: 20,
        }
    }
}

#[derive(Debug, Default)]
struct StalenessCounters {
    no_new_plan: u64,
    no_new_shape: u64,
    no_new_operator_signature: u64,
    no_new_join_type: u64,
    no_new_join_graph: u64,
    no_join_at_all: u64,
    no_aggregate_at_all: u64,
}

pub struct QpgTracker {
    seen_plan: HashSet<u64>,
    seen_shape: HashSet<u64>,
    seen_operator_signature: HashSet<u64>,
    seen_join_type: HashSet<u64>,
    seen_join_graph: HashSet<u64>,
    staleness: StalenessCounters,
    thresholds: QpgThresholds,
    weights: AdaptiveWeights,
}

impl QpgTracker {
    pub fn new(thresholds: QpgThresholds) -> Self {
        Self {
            seen_plan: HashSet::new(),
            seen_shape: HashSet::new(),
            seen_operator_signature: HashSet::new(),
            seen_join_type: HashSet::new(),
            seen_join_graph: HashSet::new(),
            staleness: StalenessCounters::default(),
            thresholds,
            weights: AdaptiveWeights::default(),
        }
    }

    /// Records one observed `EXPLAIN` plan and returns `true` if any digest
    /// was new (coverage increased).
    pub fn observe(&mut self, explain_text: &str) -> bool {
        let digests = compute_digests(explain_text);
        let mut new_coverage = false;

        new_coverage |= Self::record(&mut self.seen_plan, digests.full, &mut self.staleness.no_new_plan);
        new_coverage |= Self::record(&mut self.seen_shape, digests.shape, &mut self.staleness.no_new_shape);
        new_coverage |= Self::record(
            &mut self.seen_operator_signature,
            digests.operator_signature,
            &mut self.staleness.no_new_operator_signature,
        );
        new_coverage |= Self::record(
            &mut self.seen_join_type,
            digests.join_sequence,
            &mut self.staleness.no_new_join_type,
        );
        new_coverage |= Self::record(
            &mut self.seen_join_graph,
            digests.join_graph,
            &mut self.staleness.no_new_join_graph,
        );

        if digests.has_join {
            self.staleness.no_join_at_all = 0;
        } else {
            self.staleness.no_join_at_all += 1;
        }
        if digests.has_aggregate {
            self.staleness.no_aggregate_at_all = 0;
        } else {
            self.staleness.no_aggregate_at_all += 1;
        }

        self.maybe_trigger(&digests);
        new_coverage
    }

    fn record(seen: &mut HashSet<u64>, digest: u64, counter: &mut u64) -> bool {
        if seen.insert(digest) {
            *counter = 0;
            true
        } else {
            *counter += 1;
            false
        }
    }

    fn maybe_trigger(&mut self, _digests: &PlanDigests) {
        let plateau = self.thresholds.plateau;
        let ttl = self.thresholds.override_ttl;

        if self.staleness.no_join_at_all >= plateau {
            self.weights.overwrite(ttl, |w| w.join_count = Some(w.join_count.unwrap_or(1).max(2)));
        }
        if self.staleness.no_aggregate_at_all >= plateau {
            self.weights.overwrite(ttl, |w| w.aggregate_prob = Some(0.8));
        }
        let plan_stalled = self.staleness.no_new_plan >= plateau
            || self.staleness.no_new_shape >= plateau
            || self.staleness.no_new_operator_signature >= plateau
            || self.staleness.no_new_join_type >= plateau
            || self.staleness.no_new_join_graph >= plateau;
        if plan_stalled {
            tracing::debug!(plateau, "qpg coverage stalled, overriding generation weights");
            self.weights.overwrite(ttl, |w| {
                w.join_count = Some(w.join_count.unwrap_or(0).max(1) + 1);
                w.subquery_count = Some(w.subquery_count.unwrap_or(0) + 1);
            });
        }
    }

    /// The currently active generation-bias override, if any staleness
    /// counter has crossed its threshold within the last `override_ttl`
    /// queries. Call [`AdaptiveWeights::tick`] on the returned value's
    /// owner once the generator has consumed it.
    pub fn active_override(&self) -> Option<AdaptiveWeights> {
        self.weights.is_active().then_some(self.weights)
    }

    pub fn tick_override(&mut self) {
        self.weights.tick();
    }

    pub fn unique_plan_count(&self) -> usize {
        self.seen_plan.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> QpgThresholds {
        QpgThresholds {
            plateau: 3,
            override_ttl: 2,
        }
    }

    #[test]
    fn a_new_plan_shape_reports_new_coverage() {
        let mut tracker = QpgTracker::new(thresholds());
        assert!(tracker.observe("TableReader_1 root data:TableFullScan_2 table:t0"));
        assert!(!tracker.observe("TableReader_3 root data:TableFullScan_4 table:t1"));
    }

    #[test]
    fn repeated_identical_shapes_plateau_and_trigger_an_override() {
        let mut tracker = QpgTracker::new(thresholds());
        for _ in 0..5 {
            tracker.observe("TableReader_1 root data:TableFullScan_2 table:t0");
        }
        let over = tracker.active_override();
        assert!(over.is_some());
        assert!(over.unwrap().join_count.is_some());
    }

    #[test]
    fn never_seeing_a_join_eventually_forces_join_count_up() {
        let mut tracker = QpgTracker::new(thresholds());
        for i in 0..5 {
            tracker.observe(&format!("TableReader_{i} root data:TableFullScan_{i}"));
        }
        let over = tracker.active_override().unwrap();
        assert!(over.join_count.unwrap() >= 2);
    }

    #[test]
    fn overrides_expire_after_their_ttl() {
        let mut weights = AdaptiveWeights::default();
        weights.overwrite(2, |w| w.join_count = Some(3));
        assert!(weights.is_active());
        weights.tick();
        assert!(weights.is_active());
        weights.tick();
        assert!(!weights.is_active());
    }
}
