//! The DML bandit: Insert vs. Update vs. Delete (§4.6 step 3).

use crate::ucb1::{pick_weighted, Bandit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dml {
    Insert,
    Update,
    Delete,
}

impl Dml {
    pub const ALL: [Dml; 3] = [Dml::Insert, Dml::Update, Dml::Delete];

    fn index(self) -> usize {
        match self {
            Dml::Insert => 0,
            Dml::Update => 1,
            Dml::Delete => 2,
        }
    }

    fn from_index(idx: usize) -> Self {
        Self::ALL[idx]
    }
}

pub struct DmlBandit {
    bandit: Bandit,
    weights: [i64; 3],
    adaptive: bool,
}

impl DmlBandit {
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

    pub fn pick(&self, rng: &mut impl rand::Rng) -> Dml {
        if self.adaptive {
            if let Some(idx) = self.bandit.pick() {
                return Dml::from_index(idx);
            }
        }
        Dml::from_index(pick_weighted(&self.weights, rng))
    }

    pub fn update(&mut self, dml: Dml, reward: f64) {
        self.bandit.update(dml.index(), reward);
    }

    /// Per-arm pull counts, indexed like [`Dml::ALL`]; used for the
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
    fn picks_among_enabled_arms_only() {
        let bandit = DmlBandit::new([1, 1, 0], 1.4, None, true);
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..20 {
            assert_ne!(bandit.pick(&mut rng), Dml::Delete);
        }
    }
}
