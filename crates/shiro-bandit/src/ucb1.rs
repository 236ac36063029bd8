//! A UCB1 bandit with an optional sliding window, shared by every
//! selection axis (action/oracle/DML/feature). One `Bandit` owns `N` arms
//! addressed by plain index; callers wrap it with an enum for a readable
//! API (see `action.rs`/`oracle.rs`/`dml.rs`/`feature.rs`).

use std::collections::VecDeque;

/// One arm's running statistics. `count`/`reward_sum` are restricted to
/// whatever is currently inside the sliding window (or the whole history,
/// if no window is configured) — `Bandit::update` keeps both in sync as
/// entries age out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Arm {
    pub count: u64,
    pub reward_sum: f64,
    pub enabled: bool,
}

impl Arm {
    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.reward_sum / self.count as f64
        }
    }
}

/// UCB1 over `N` arms: `score_i = mean_i + c * sqrt(ln(T) / n_i)`, with
/// `enabled[]` excluding arms whose configured weight is zero so a
/// disabled choice never gets selected even under bandit control.
///
/// When `window` is `Some(w)`, a ring buffer of the last `w` `(arm,
/// reward)` pulls is kept; pulls older than the window are evicted and
/// their contribution subtracted back out of the arm's `count`/
/// `reward_sum`, degrading to a plain (unwindowed) UCB1 once the buffer
/// never fills.
pub struct Bandit {
    arms: Vec<Arm>,
    exploration: f64,
    window: Option<usize>,
    history: VecDeque<(usize, f64)>,
}

impl Bandit {
    pub fn new(n_arms: usize, exploration: f64, window: Option<usize>) -> Self {
        Self {
            arms: vec![
                Arm {
                    count: 0,
                    reward_sum: 0.0,
                    enabled: true
                };
                n_arms
            ],
            exploration,
            window,
            history: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.arms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }

    pub fn arm(&self, idx: usize) -> Arm {
        self.arms[idx]
    }

    /// Disables arm `idx` so it is never returned by [`Bandit::pick`],
    /// matching a configured weight of zero (§4.4: "so a disabled oracle
    /// stays disabled under bandit selection too").
    pub fn set_enabled(&mut self, idx: usize, enabled: bool) {
        self.arms[idx].enabled = enabled;
    }

    /// Picks the highest-scoring enabled arm. An untried enabled arm
    /// (`count == 0`) always wins over any tried arm, and ties among
    /// untried arms resolve to the lowest index (§8 scenario 5). Returns
    /// `None` only when every arm is disabled.
    pub fn pick(&self) -> Option<usize> {
        let enabled: Vec<usize> = (0..self.arms.len()).filter(|&i| self.arms[i].enabled).collect();
        if enabled.is_empty() {
            return None;
        }
        if let Some(&idx) = enabled.iter().find(|&&i| self.arms[i].count == 0) {
            return Some(idx);
        }
        let total: u64 = enabled.iter().map(|&i| self.arms[i].count).sum();
        let total_ln = (total.max(1) as f64).ln();
        enabled
            .into_iter()
            .max_by(|&a, &b| self.score(a, total_ln).total_cmp(&self.score(b, total_ln)))
    }

    fn score(&self, idx: usize, total_ln: f64) -> f64 {
        let arm = self.arms[idx];
        arm.mean() + self.exploration * (total_ln / arm.count as f64).sqrt()
    }

    /// Records one pull of `idx` with the given reward, evicting the
    /// oldest pull from the sliding window (if configured and full).
    pub fn update(&mut self, idx: usize, reward: f64) {
        self.arms[idx].count += 1;
        self.arms[idx].reward_sum += reward;
        if let Some(window) = self.window {
            self.history.push_back((idx, reward));
            if self.history.len() > window {
                if let Some((old_idx, old_reward)) = self.history.pop_front() {
                    self.arms[old_idx].count = self.arms[old_idx].count.saturating_sub(1);
                    self.arms[old_idx].reward_sum -= old_reward;
                }
            }
        }
    }
}

/// Weighted-random fallback used whenever adaptive selection is disabled
/// for a category (§4.4: "Fallback is weighted random choice using the
/// configured integer weights").
///
/// Invariant (§8): if `sum(max(w_i, 0)) > 0`, the returned index `i`
/// satisfies `w_i > 0`; otherwise a uniform index among all positions is
/// returned.
pub fn pick_weighted(weights: &[i64], rng: &mut impl rand::Rng) -> usize {
    assert!(!weights.is_empty(), "pick_weighted requires at least one weight");
    let total: i64 = weights.iter().map(|&w| w.max(0)).sum();
    if total <= 0 {
        return rng.gen_range(0..weights.len());
    }
    let mut r = rng.gen_range(0..total);
    for (i, &w) in weights.iter().enumerate() {
        let w = w.max(0);
        if r < w {
            return i;
        }
        r -= w;
    }
    unreachable!("r stays below the summed positive weights")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn untried_arms_are_picked_before_any_tried_arm() {
        let mut bandit = Bandit::new(2, 1.4, None);
        assert_eq!(bandit.pick(), Some(0));
        bandit.update(0, 1.0);
        assert_eq!(bandit.pick(), Some(1));
    }

    #[test]
    fn disabled_arms_are_never_picked() {
        let mut bandit = Bandit::new(2, 1.4, None);
        bandit.set_enabled(0, false);
        assert_eq!(bandit.pick(), Some(1));
        bandit.update(1, 1.0);
        assert_eq!(bandit.pick(), Some(1));
    }

    #[test]
    fn none_when_every_arm_disabled() {
        let mut bandit = Bandit::new(2, 1.4, None);
        bandit.set_enabled(0, false);
        bandit.set_enabled(1, false);
        assert_eq!(bandit.pick(), None);
    }

    #[test]
    fn higher_mean_reward_arm_eventually_wins() {
        let mut bandit = Bandit::new(2, 0.0, None);
        bandit.update(0, 0.0);
        bandit.update(1, 1.0);
        assert_eq!(bandit.pick(), Some(1));
    }

    #[test]
    fn sliding_window_forgets_old_pulls() {
        let mut bandit = Bandit::new(2, 0.0, Some(2));
        bandit.update(0, 1.0);
        bandit.update(0, 1.0);
        // Window now holds [(0,1.0), (0,1.0)]; pushing a third pull evicts
        // the first, so arm 0's count/reward drop back to 1 pull.
        bandit.update(1, 0.0);
        assert_eq!(bandit.arm(0).count, 1);
    }

    #[test]
    fn pick_weighted_only_returns_positive_weight_indices() {
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..200 {
            let idx = pick_weighted(&[0, 5, 0], &mut rng);
            assert_eq!(idx, 1);
        }
    }

    #[test]
    fn pick_weighted_falls_back_to_uniform_when_all_weights_nonpositive() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(pick_weighted(&[0, 0, 0], &mut rng));
        }
        assert_eq!(seen, [0usize, 1, 2].into_iter().collect());
    }
}
