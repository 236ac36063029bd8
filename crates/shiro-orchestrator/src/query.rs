//! The Query action (§4.2, §4.4, §4.5): route between the full
//! differential oracle pipeline and the plan-cache protocol, folding
//! coverage observation and bandit reward feedback in either path.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use shiro_bandit::{OracleArm, OraclePick};
use shiro_executor::Connection;
use shiro_oracle::{FeatureBias, Generator, OracleContext, OracleKind, OracleSet, SimpleGenerator};
use shiro_plancache::{PlanCacheConfig, PlanCacheContext, PlanCacheOracle, SimpleParamGenerator, WarningHistogram};
use shiro_types::{OracleResult, ReplayKind, ReplaySpec};

use crate::classify::{annotate_error, downgrade_false_positive};
use crate::state::Shared;

/// CERT's tolerance isn't config-driven (`OraclesConfig` only carries
/// `cert_min_base_rows`); this matches `CertOracle::default()`'s own
/// hardcoded `2.0` so the orchestrator's CERT instance and the minimizer's
/// replay of a CERT capture agree on what counts as a gross overestimate.
pub const CERT_TOLERANCE: f64 = 2.0;

pub enum QueryOutcome {
    Oracle { kind: OracleKind, result: OracleResult },
    PlanCache { result: OracleResult },
}

impl QueryOutcome {
    pub fn result(&self) -> &OracleResult {
        match self {
            QueryOutcome::Oracle { result, .. } | QueryOutcome::PlanCache { result } => result,
        }
    }

    pub fn kind(&self) -> OracleKind {
        match self {
            QueryOutcome::Oracle { kind, .. } => *kind,
            QueryOutcome::PlanCache { .. } => OracleKind::PlanCache,
        }
    }
}

/// Builds the `ReplaySpec` a captured result hands to the minimizer
/// (§4.8's input, not produced by any oracle itself). A present `error`
/// always wins: an error capture replays by error class, not by
/// re-deriving whichever signature comparison the oracle would have made.
/// Otherwise the mapping follows each oracle's own comparison shape:
/// paired-signature oracles get `Signature`, Impo's containment check
/// gets `ImpoContains`, CERT's estimate-vs-actual gets `PlanRows`, and
/// GroundTruth's reference-vs-SUT count gets `Count`.
pub fn replay_spec_for(kind: OracleKind, result: &OracleResult, cert_tolerance: f64) -> (ReplayKind, ReplaySpec) {
    if let Some(error) = &result.error {
        let expected = result.statements.first().cloned().unwrap_or_default();
        return (ReplayKind::CaseError, ReplaySpec::new(ReplayKind::CaseError, expected).with_actual(error.clone()));
    }

    let first = result.statements.first().cloned().unwrap_or_default();
    let last = result.statements.last().cloned();

    match kind {
        OracleKind::NoRec | OracleKind::Tlp | OracleKind::Dqp | OracleKind::CoddTest | OracleKind::PlanCache => {
            let mut spec = ReplaySpec::new(ReplayKind::Signature, first);
            if let Some(actual) = last {
                spec = spec.with_actual(actual);
            }
            (ReplayKind::Signature, spec)
        }
        OracleKind::Dqe => {
            let mut spec = ReplaySpec::new(ReplayKind::Signature, first).with_set_var("tidb_enable_index_merge", "OFF");
            if let Some(actual) = last {
                spec = spec.with_actual(actual);
            }
            (ReplayKind::Signature, spec)
        }
        OracleKind::Impo => {
            let mut spec = ReplaySpec::new(ReplayKind::ImpoContains, first);
            if let Some(actual) = last {
                spec = spec.with_actual(actual);
            }
            (ReplayKind::ImpoContains, spec)
        }
        OracleKind::Cert => {
            let mut spec = ReplaySpec::new(ReplayKind::PlanRows, first).with_tolerance(cert_tolerance);
            if let Some(actual) = last {
                spec = spec.with_actual(actual);
            }
            (ReplayKind::PlanRows, spec)
        }
        OracleKind::GroundTruth => (ReplayKind::Count, ReplaySpec::new(ReplayKind::Count, first)),
    }
}

fn arm_to_kind(arm: OracleArm) -> OracleKind {
    match arm {
        OracleArm::NoRec => OracleKind::NoRec,
        OracleArm::Tlp => OracleKind::Tlp,
        OracleArm::Dqp => OracleKind::Dqp,
        OracleArm::CoddTest => OracleKind::CoddTest,
        OracleArm::Dqe => OracleKind::Dqe,
        OracleArm::Impo => OracleKind::Impo,
        OracleArm::GroundTruth => OracleKind::GroundTruth,
    }
}

fn kind_to_arm(kind: OracleKind) -> Option<OracleArm> {
    match kind {
        OracleKind::NoRec => Some(OracleArm::NoRec),
        OracleKind::Tlp => Some(OracleArm::Tlp),
        OracleKind::Dqp => Some(OracleArm::Dqp),
        OracleKind::CoddTest => Some(OracleArm::CoddTest),
        OracleKind::Dqe => Some(OracleArm::Dqe),
        OracleKind::Impo => Some(OracleArm::Impo),
        OracleKind::GroundTruth => Some(OracleArm::GroundTruth),
        OracleKind::Cert | OracleKind::PlanCache => None,
    }
}

/// Starts from the feature bandit's pick, then lets an active QPG or
/// KQE-lite coverage override clamp `join_count`/`subquery_count`/
/// `aggregate_prob` upward for the remainder of its TTL.
fn resolve_bias(shared: &Shared, rng: &mut impl Rng) -> FeatureBias {
    let choice = shared.lock_stats().bandits.feature.pick(rng);
    let mut bias = FeatureBias {
        join_count: choice.join_count,
        subquery_count: choice.subquery_count,
        aggregate_prob: choice.aggregate_prob,
        ..FeatureBias::default()
    };

    {
        let mut qpg = shared.lock_qpg();
        if let Some(over) = qpg.tracker.active_override() {
            if let Some(j) = over.join_count {
                bias.join_count = bias.join_count.max(j);
            }
            if let Some(s) = over.subquery_count {
                bias.subquery_count = bias.subquery_count.max(s);
            }
            if let Some(a) = over.aggregate_prob {
                bias.aggregate_prob = bias.aggregate_prob.max(a);
            }
        }
        qpg.tracker.tick_override();
    }

    if shared.config.kqe.enabled {
        let mut kqe = shared.lock_kqe();
        if let Some(over) = kqe.active_override() {
            if let Some(j) = over.join_count {
                bias.join_count = bias.join_count.max(j);
            }
        }
        kqe.tick_override();
    }

    bias
}

/// Runs `EXPLAIN` over the query's own base SQL purely for coverage
/// bookkeeping, skipping it when `SeenSqlCache` has already observed the
/// same text recently. Best-effort: a failed `EXPLAIN` just means no
/// coverage signal for this query, not an oracle failure.
async fn observe_coverage(shared: &Shared, conn: &mut dyn Connection, base_sql: &str, cancel: &CancellationToken) {
    let skip = shared.lock_qpg().seen_sql.observe(base_sql);
    if skip {
        return;
    }
    let explain_sql = format!("EXPLAIN FORMAT='{}' {base_sql}", shared.config.qpg.explain_format);
    let Ok(rows) = conn.exec_query(&explain_sql, cancel).await else {
        return;
    };
    let explain_text = rows.iter().flat_map(|row| row.iter().map(ToString::to_string)).collect::<Vec<_>>().join(" ");

    shared.lock_qpg().tracker.observe(&explain_text);
    if shared.config.kqe.enabled {
        shared.lock_kqe().observe(&explain_text);
    }
}

/// Feeds the oracle's outcome back into the oracle and feature bandits.
/// CERT is sampled outside the bandit (§4.4) so it never reports a reward
/// here; the plan-cache route doesn't touch either bandit since it isn't
/// one of their arms.
fn apply_reward(shared: &Shared, kind: OracleKind, result: &OracleResult) {
    let reward = if result.ok { 0.0 } else { 1.0 };
    let mut stats = shared.lock_stats();
    if let Some(arm) = kind_to_arm(kind) {
        stats.bandits.oracle.update(arm, reward);
    }
    stats.bandits.feature.update_last(reward);
}

/// Bounds an oracle's run under `statement_timeout_ms`; a child timeout
/// derived from the root run, not a cancellation -- a run that times out
/// still reports as a captured error rather than silently vanishing.
async fn run_with_timeout(
    statement_timeout_ms: u64,
    oracle_name: &'static str,
    fut: impl std::future::Future<Output = OracleResult>,
) -> OracleResult {
    match tokio::time::timeout(Duration::from_millis(statement_timeout_ms), fut).await {
        Ok(result) => result,
        Err(_) => OracleResult::error(oracle_name, Vec::new(), "statement timed out"),
    }
}

/// Executes one Query action: routes to the plan-cache protocol with
/// probability `plan_cache_prob` (always, if `plan_cache_only`), otherwise
/// picks an oracle arm and runs the full differential pipeline.
#[allow(clippy::too_many_arguments)]
pub async fn execute_query(
    shared: &Shared,
    conn: &mut dyn Connection,
    rng: &mut impl Rng,
    oracle_set: &OracleSet,
    param_gen: &mut SimpleParamGenerator,
    base_gen: &mut SimpleGenerator,
    histogram: &mut WarningHistogram,
    cancel: &CancellationToken,
) -> QueryOutcome {
    let cfg = &shared.config;
    let schema = shared.lock_gen().schema.clone();

    let use_plan_cache = cfg.plan_cache_only || rng.gen_range(0..100) < cfg.plan_cache_prob;
    if use_plan_cache {
        let mut ctx = PlanCacheContext {
            conn,
            generator: param_gen,
            schema: &schema,
            cancel,
            histogram,
            config: PlanCacheConfig {
                round_scale: cfg.signature.plan_cache_round_scale as u32,
                max_first_execute_retries: shiro_plancache::MAX_FIRST_EXECUTE_RETRIES,
            },
        };
        let plan_cache_oracle = PlanCacheOracle::new();
        let mut result = run_with_timeout(cfg.statement_timeout_ms, plan_cache_oracle.name(), plan_cache_oracle.run(&mut ctx))
            .await;
        if let Some(base) = result.statements.first() {
            observe_coverage(shared, conn, base, cancel).await;
        }
        annotate_error(&mut result);
        downgrade_false_positive(OracleKind::PlanCache, &mut result);
        return QueryOutcome::PlanCache { result };
    }

    let bias = resolve_bias(shared, rng);
    let pick = shared.lock_stats().bandits.oracle.pick(rng);
    let kind = match pick {
        OraclePick::Cert => OracleKind::Cert,
        OraclePick::Arm(arm) => arm_to_kind(arm),
    };
    let oracle = oracle_set.get(kind).expect("every non-PlanCache kind resolves in the default set");

    let mut ctx = OracleContext {
        conn,
        generator: base_gen,
        schema: &schema,
        bias,
        cancel,
        round_scale: cfg.signature.round_scale as u32,
    };
    let mut result = run_with_timeout(cfg.statement_timeout_ms, oracle.name(), oracle.run(&mut ctx)).await;
    if let Some(base) = result.statements.first() {
        observe_coverage(shared, conn, base, cancel).await;
    }
    annotate_error(&mut result);
    downgrade_false_positive(kind, &mut result);
    apply_reward(shared, kind, &result);

    QueryOutcome::Oracle { kind, result }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_and_kind_round_trip_for_every_bandit_arm() {
        for arm in OracleArm::ALL {
            let kind = arm_to_kind(arm);
            assert_eq!(kind_to_arm(kind), Some(arm));
        }
    }

    #[test]
    fn cert_and_plan_cache_have_no_bandit_arm() {
        assert_eq!(kind_to_arm(OracleKind::Cert), None);
        assert_eq!(kind_to_arm(OracleKind::PlanCache), None);
    }

    #[test]
    fn errored_result_always_maps_to_case_error_regardless_of_kind() {
        let result = OracleResult::error("NoREC", vec!["SELECT 1".to_string()], "server panic");
        let (kind, spec) = replay_spec_for(OracleKind::NoRec, &result, CERT_TOLERANCE);
        assert_eq!(kind, ReplayKind::CaseError);
        assert_eq!(spec.expected_sql, "SELECT 1");
    }

    #[test]
    fn mismatch_maps_to_signature_with_expected_and_actual() {
        let result =
            OracleResult::mismatch("NoREC", vec!["SELECT 1".to_string(), "SELECT 2".to_string()], "1", "2");
        let (kind, spec) = replay_spec_for(OracleKind::NoRec, &result, CERT_TOLERANCE);
        assert_eq!(kind, ReplayKind::Signature);
        assert_eq!(spec.expected_sql, "SELECT 1");
        assert_eq!(spec.actual_sql.as_deref(), Some("SELECT 2"));
    }

    #[test]
    fn impo_mismatch_maps_to_impo_contains() {
        let result = OracleResult::mismatch(
            "Impo",
            vec!["SELECT weaker".to_string(), "SELECT stronger".to_string()],
            "contained",
            "not_contained",
        );
        let (kind, _spec) = replay_spec_for(OracleKind::Impo, &result, CERT_TOLERANCE);
        assert_eq!(kind, ReplayKind::ImpoContains);
    }
}
