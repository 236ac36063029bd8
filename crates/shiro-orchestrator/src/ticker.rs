//! Periodic stats line: every `report_interval_seconds` this logs the run
//! counters and checks them against `logging.metrics`' thresholds,
//! escalating to a `warn` line when a ratio drifts out of bounds. Polls
//! a lock-guarded stats snapshot on a fixed `tokio::time::interval` for
//! as long as the run lives.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::state::Shared;

/// Runs until `cancel` fires. Meant to be spawned alongside the worker
/// tasks and left to exit on its own when the run is cancelled.
pub async fn run(shared: &Shared, cancel: &CancellationToken) {
    let interval_secs = shared.config.logging.report_interval_seconds.max(1);
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.tick().await; // first tick fires immediately; skip it

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => log_once(shared),
        }
    }
}

fn log_once(shared: &Shared) {
    let stats = shared.lock_stats();
    let c = &stats.counters;
    tracing::info!(
        sql_attempted = c.sql_attempted,
        sql_valid = c.sql_valid,
        sql_valid_ratio = c.sql_valid_ratio(),
        impo_total = c.impo_total,
        impo_invalid_columns_ratio = c.impo_invalid_columns_ratio(),
        impo_base_exec_failed_ratio = c.impo_base_exec_failed_ratio(),
        captures = c.captures,
        rotations = c.rotations,
        "shiro stats",
    );

    let thresholds = &shared.config.logging.metrics;
    if thresholds.sql_valid_min_ratio > 0.0 && c.sql_valid_ratio() < thresholds.sql_valid_min_ratio {
        tracing::warn!(
            ratio = c.sql_valid_ratio(),
            min = thresholds.sql_valid_min_ratio,
            "sql_valid_ratio below threshold",
        );
    }
    if thresholds.impo_invalid_columns_max_ratio > 0.0
        && c.impo_invalid_columns_ratio() > thresholds.impo_invalid_columns_max_ratio
    {
        tracing::warn!(
            ratio = c.impo_invalid_columns_ratio(),
            max = thresholds.impo_invalid_columns_max_ratio,
            "impo_invalid_columns_ratio above threshold",
        );
    }
    if thresholds.impo_base_exec_failed_max_ratio > 0.0
        && c.impo_base_exec_failed_ratio() > thresholds.impo_base_exec_failed_max_ratio
    {
        tracing::warn!(
            ratio = c.impo_base_exec_failed_ratio(),
            max = thresholds.impo_base_exec_failed_max_ratio,
            "impo_base_exec_failed_ratio above threshold",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiro_config::ShiroConfig;
    use shiro_types::SchemaState;

    #[test]
    fn log_once_does_not_panic_on_a_fresh_run() {
        let shared = Shared::new(ShiroConfig::default(), SchemaState::new("db"));
        log_once(&shared);
    }

    #[tokio::test]
    async fn run_exits_promptly_once_cancelled() {
        let shared = Shared::new(ShiroConfig::default(), SchemaState::new("db"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        run(&shared, &cancel).await;
    }
}
