//! The feature bandit: a product of four arm dimensions (join count,
//! subquery count, aggregate probability, index-prefix probability),
//! picked and updated as a single flattened arm per §4.4/§4.6.
//!
//! The reward policy updates this bandit's last-picked arm with the same
//! reward signal as the oracle that consumed its features (§4.4: "The
//! feature bandit also updates its arms with the same reward on the
//! last-generated query features"), so `FeatureBandit` remembers the last
//! arm it handed out rather than asking the caller to re-derive it.

use std::cell::Cell;

use crate::ucb1::Bandit;

/// The discrete candidate values each axis can take. An arm is one
/// combination drawn from the Cartesian product of all four axes.
#[derive(Debug, Clone)]
pub struct FeatureLevels {
    pub join_count: Vec<u32>,
    pub subquery_count: Vec<u32>,
    pub aggregate_prob: Vec<f64>,
    pub index_prefix_prob: Vec<f64>,
}

impl Default for FeatureLevels {
    fn default() -> Self {
        Self {
            join_count: vec![0, 1, 2, 3],
            subquery_count: vec![0, 1, 2],
            aggregate_prob: vec![0.0, 0.3, 0.6],
            index_prefix_prob: vec![0.0, 0.5],
        }
    }
}

impl FeatureLevels {
    fn arm_count(&self) -> usize {
        self.join_count.len() * self.subquery_count.len() * self.aggregate_prob.len() * self.index_prefix_prob.len()
    }

    fn decode(&self, idx: usize) -> FeatureChoice {
        let n_join = self.join_count.len();
        let n_sub = self.subquery_count.len();
        let n_agg = self.aggregate_prob.len();
        let n_idx = self.index_prefix_prob.len();

        let idx_prefix = idx % n_idx;
        let rest = idx / n_idx;
        let agg = rest % n_agg;
        let rest = rest / n_agg;
        let sub = rest % n_sub;
        let join = (rest / n_sub) % n_join;

        FeatureChoice {
            join_count: self.join_count[join],
            subquery_count: self.subquery_count[sub],
            aggregate_prob: self.aggregate_prob[agg],
            index_prefix_prob: self.index_prefix_prob[idx_prefix],
        }
    }
}

/// One concrete feature combination to generate the next query with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureChoice {
    pub join_count: u32,
    pub subquery_count: u32,
    pub aggregate_prob: f64,
    pub index_prefix_prob: f64,
}

pub struct FeatureBandit {
    bandit: Bandit,
    levels: FeatureLevels,
    adaptive: bool,
    last_pick: Cell<Option<usize>>,
}

impl FeatureBandit {
    pub fn new(levels: FeatureLevels, exploration: f64, window: Option<usize>, adaptive: bool) -> Self {
        let arm_count = levels.arm_count();
        Self {
            bandit: Bandit::new(arm_count, exploration, window),
            levels,
            adaptive,
            last_pick: Cell::new(None),
        }
    }

    /// Picks the next feature combination. Falls back to a uniform random
    /// combination when adaptive selection is off, since the feature
    /// bandit has no configured integer weight vector to fall back on
    /// (only the action/oracle/DML bandits do, per §6).
    pub fn pick(&self, rng: &mut impl rand::Rng) -> FeatureChoice {
        let idx = if self.adaptive {
            self.bandit.pick().unwrap_or(0)
        } else {
            rng.gen_range(0..self.bandit.len())
        };
        self.last_pick.set(Some(idx));
        self.levels.decode(idx)
    }

    /// Updates whichever arm [`FeatureBandit::pick`] most recently
    /// returned. A no-op if `pick` was never called.
    pub fn update_last(&mut self, reward: f64) {
        if let Some(idx) = self.last_pick.get() {
            self.bandit.update(idx, reward);
        }
    }

    /// Per-arm pull counts over the flattened product space; used for the
    /// periodic `dynamic_state.json` snapshot.
    pub fn counts(&self) -> Vec<u64> {
        (0..self.bandit.len()).map(|idx| self.bandit.arm(idx).count).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn decode_round_trips_every_arm_to_a_distinct_combination() {
        let levels = FeatureLevels::default();
        let mut seen = std::collections::HashSet::new();
        for idx in 0..levels.arm_count() {
            let choice = levels.decode(idx);
            seen.insert((
                choice.join_count,
                choice.subquery_count,
                choice.aggregate_prob.to_bits(),
                choice.index_prefix_prob.to_bits(),
            ));
        }
        assert_eq!(seen.len(), levels.arm_count());
    }

    #[test]
    fn update_last_targets_the_most_recent_pick() {
        let mut bandit = FeatureBandit::new(FeatureLevels::default(), 1.4, None, true);
        let mut rng = SmallRng::seed_from_u64(2);
        bandit.pick(&mut rng);
        let idx = bandit.last_pick.get().unwrap();
        bandit.update_last(1.0);
        assert_eq!(bandit.bandit.arm(idx).count, 1);
    }
}
