//! The top-level action bandit: DDL vs. DML vs. Query (§4.6 step 1).

use crate::ucb1::{pick_weighted, Bandit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Ddl,
    Dml,
    Query,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Ddl, Action::Dml, Action::Query];

    fn index(self) -> usize {
        match self {
            Action::Ddl => 0,
            Action::Dml => 1,
            Action::Query => 2,
        }
    }

    fn from_index(idx: usize) -> Self {
        Self::ALL[idx]
    }
}

pub struct ActionBandit {
    bandit: Bandit,
    weights: [i64; 3],
    adaptive: bool,
}

impl ActionBandit {
    pub fn new(weights: [i64; 3], exploration: f64, window: Option<usize>, adaptive: bool) -> Self {
        let mut bandit = Bandit::new(3, exploration, window);
        for (idx, &w) in weights.iter().enumerate() {
            bandit.set_enabled(idx, w > 0);
        }
        Self {
            bandit,
            weights,
            adaptive,
        }
    }

    /// Picks an action. Under adaptive selection, disabled arms (weight
    /// `<= 0`) stay excluded from UCB1 just as they are from the weighted
    /// fallback.
    pub fn pick(&self, rng: &mut impl rand::Rng) -> Action {
        if self.adaptive {
            if let Some(idx) = self.bandit.pick() {
                return Action::from_index(idx);
            }
        }
        Action::from_index(pick_weighted(&self.weights, rng))
    }

    pub fn update(&mut self, action: Action, reward: f64) {
        self.bandit.update(action.index(), reward);
    }

    /// Per-arm pull counts, indexed like [`Action::ALL`]; used for the
    /// periodic `dynamic_state.json` snapshot.
    pub fn counts(&self) -> [u64; 3] {
        std::array::from_fn(|idx| self.bandit.arm(idx).count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn zero_weight_action_is_never_picked_adaptively() {
        let bandit = ActionBandit::new([1, 0, 1], 1.4, None, true);
        let mut rng = SmallRng::seed_from_u64(0);
        for _ in 0..20 {
            assert_ne!(bandit.pick(&mut rng), Action::Dml);
        }
    }

    #[test]
    fn non_adaptive_falls_back_to_weighted_choice() {
        let bandit = ActionBandit::new([0, 0, 1], 1.4, None, false);
        let mut rng = SmallRng::seed_from_u64(0);
        assert_eq!(bandit.pick(&mut rng), Action::Query);
    }
}
