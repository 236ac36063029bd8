//! The oracle bandit: picks among the non-CERT, non-PlanCache oracle set
//! (§4.4). CERT is kept deterministic at a tiny sampling rate instead of
//! competing for bandit arms, and PlanCache is routed to directly from the
//! orchestration loop's `plan_cache_prob` check rather than through this
//! bandit at all.

use crate::ucb1::{pick_weighted, Bandit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OracleArm {
    NoRec,
    Tlp,
    Dqp,
    CoddTest,
    Dqe,
    Impo,
    GroundTruth,
}

impl OracleArm {
    pub const ALL: [OracleArm; 7] = [
        OracleArm::NoRec,
        OracleArm::Tlp,
        OracleArm::Dqp,
        OracleArm::CoddTest,
        OracleArm::Dqe,
        OracleArm::Impo,
        OracleArm::GroundTruth,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|&a| a == self).expect("OracleArm::ALL is exhaustive")
    }

    fn from_index(idx: usize) -> Self {
        Self::ALL[idx]
    }
}

pub struct OracleBandit {
    bandit: Bandit,
    weights: [i64; 7],
    adaptive: bool,
    /// Sampling rate (0.0..=1.0) at which CERT is chosen deterministically
    /// ahead of the bandit/weighted pick, per §4.4.
    cert_rate: f64,
}

/// The result of one oracle-bandit pick: either the deterministic CERT
/// sample, or an arm chosen from the bandit/weighted set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OraclePick {
    Cert,
    Arm(OracleArm),
}

impl OracleBandit {
    pub fn new(weights: [i64; 7], cert_rate: f64, exploration: f64, window: Option<usize>, adaptive: bool) -> Self {
        let mut bandit = Bandit::new(7, exploration, window);
        for (idx, &w) in weights.iter().enumerate() {
            bandit.set_enabled(idx, w > 0);
        }
        Self {
            bandit,
            weights,
            adaptive,
            cert_rate: cert_rate.clamp(0.0, 1.0),
        }
    }

    pub fn pick(&self, rng: &mut impl rand::Rng) -> OraclePick {
        if self.cert_rate > 0.0 && rng.gen_bool(self.cert_rate) {
            return OraclePick::Cert;
        }
        if self.adaptive {
            if let Some(idx) = self.bandit.pick() {
                return OraclePick::Arm(OracleArm::from_index(idx));
            }
        }
        OraclePick::Arm(OracleArm::from_index(pick_weighted(&self.weights, rng)))
    }

    pub fn update(&mut self, arm: OracleArm, reward: f64) {
        self.bandit.update(arm.index(), reward);
    }

    /// Per-arm pull counts, indexed like [`OracleArm::ALL`]; used for the
    /// periodic `dynamic_state.json` snapshot.
    pub fn counts(&self) -> [u64; 7] {
        std::array::from_fn(|idx| self.bandit.arm(idx).count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn zero_cert_rate_never_samples_cert() {
        let bandit = OracleBandit::new([1; 7], 0.0, 1.4, None, true);
        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..50 {
            assert_ne!(bandit.pick(&mut rng), OraclePick::Cert);
        }
    }

    #[test]
    fn full_cert_rate_always_samples_cert() {
        let bandit = OracleBandit::new([1; 7], 1.0, 1.4, None, true);
        let mut rng = SmallRng::seed_from_u64(9);
        assert_eq!(bandit.pick(&mut rng), OraclePick::Cert);
    }
}
