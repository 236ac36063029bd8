//! Periodic `dynamic_state.json` snapshot (§7 "Persisted state"): a
//! best-effort dump of the seed, configured weights, bandit pull counts,
//! coverage counters, and Impo totals, rewritten on the same interval as
//! the stats line. Not load-bearing -- a failed write is logged and
//! otherwise ignored, since nothing reads this file back into a running
//! process.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::state::Shared;

#[derive(Serialize)]
struct Snapshot {
    seed: u64,
    weights: shiro_config::Weights,
    bandit_counts: BanditCounts,
    coverage: CoverageCounters,
    impo_total: u64,
    impo_invalid_columns: u64,
    impo_base_exec_failed: u64,
    captures: u64,
    rotations: u64,
}

#[derive(Serialize)]
struct BanditCounts {
    action: [u64; 3],
    dml: [u64; 3],
    oracle: [u64; 7],
    feature: Vec<u64>,
}

#[derive(Serialize)]
struct CoverageCounters {
    qpg_unique_plans: usize,
    kqe_unique_plans: usize,
}

fn snapshot(shared: &Shared) -> Snapshot {
    let stats = shared.lock_stats();
    let c = &stats.counters;
    let bandit_counts = BanditCounts {
        action: stats.bandits.action.counts(),
        dml: stats.bandits.dml.counts(),
        oracle: stats.bandits.oracle.counts(),
        feature: stats.bandits.feature.counts(),
    };
    let coverage = CoverageCounters {
        qpg_unique_plans: shared.lock_qpg().tracker.unique_plan_count(),
        kqe_unique_plans: shared.lock_kqe().unique_plan_count(),
    };

    Snapshot {
        seed: shared.config.seed,
        weights: shared.config.weights.clone(),
        bandit_counts,
        coverage,
        impo_total: c.impo_total,
        impo_invalid_columns: c.impo_invalid_columns,
        impo_base_exec_failed: c.impo_base_exec_failed,
        captures: c.captures,
        rotations: c.rotations,
    }
}

fn write_once(shared: &Shared, path: &std::path::Path) {
    let snap = snapshot(shared);
    match serde_json::to_string_pretty(&snap) {
        Ok(json) => {
            if let Err(err) = std::fs::write(path, json) {
                tracing::warn!(error = %err, path = %path.display(), "failed to write dynamic_state.json");
            }
        }
        Err(err) => tracing::warn!(error = %err, "failed to serialize dynamic_state.json"),
    }
}

/// Runs until `cancel` fires, rewriting `dynamic_state.json` under
/// `plan_replayer.output_dir` on the same interval as the stats ticker.
pub async fn run(shared: &Shared, cancel: &CancellationToken) {
    let path = std::path::Path::new(&shared.config.plan_replayer.output_dir).join("dynamic_state.json");
    let interval_secs = shared.config.logging.report_interval_seconds.max(1);
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => write_once(shared, &path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiro_config::ShiroConfig;
    use shiro_types::SchemaState;

    #[test]
    fn write_once_produces_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ShiroConfig::default();
        config.plan_replayer.output_dir = dir.path().display().to_string();
        let shared = Shared::new(config, SchemaState::new("db"));

        let path = dir.path().join("dynamic_state.json");
        write_once(&shared, &path);

        let contents = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert!(value.get("seed").is_some());
        assert!(value.get("bandit_counts").is_some());
    }
}
