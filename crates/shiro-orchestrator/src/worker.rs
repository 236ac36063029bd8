//! The per-worker loop (§4.6): picks an action, drives it through DDL,
//! DML, or the oracle/plan-cache pipeline, and on a captured query result
//! hands it to the reporter and rotates the schema. Workers never
//! rendezvous with each other; the only cross-worker coordination is the
//! four lock domains in `state.rs`.

use rand::rngs::SmallRng;
use tokio_util::sync::CancellationToken;

use shiro_bandit::Action;
use shiro_executor::Connection;
use shiro_oracle::{OracleSet, SimpleGenerator};
use shiro_plancache::{SimpleParamGenerator, WarningHistogram};
use shiro_report::SummaryContext;

use crate::classify::{classify_statement_error, StatementOutcome};
use crate::state::Shared;
use crate::{capture, ddl, dml, query, rotation};

/// Everything one worker owns across its run: its connection, its
/// independent pseudo-random source (`Seed + worker_index`, never
/// shared), and the per-worker oracle/generator/plan-cache machinery that
/// would otherwise need interior mutability to share across workers.
pub struct WorkerContext<'a> {
    pub index: u32,
    pub conn: &'a mut dyn Connection,
    pub rng: &'a mut SmallRng,
    pub oracle_set: &'a OracleSet,
    pub param_gen: &'a mut SimpleParamGenerator,
    pub base_gen: &'a mut SimpleGenerator,
    pub histogram: &'a mut WarningHistogram,
    pub base_database: String,
}

/// Runs the worker loop. `iterations = 0` means run until `cancel` fires;
/// otherwise stop after that many iterations complete (capture + rotation
/// counts as part of the iteration that triggered it).
pub async fn run(shared: &Shared, ctx: &mut WorkerContext<'_>, iterations: u64, cancel: &CancellationToken) {
    let mut done: u64 = 0;
    loop {
        if cancel.is_cancelled() {
            return;
        }
        if iterations != 0 && done >= iterations {
            return;
        }

        run_one(shared, ctx, cancel).await;
        done += 1;
    }
}

async fn run_one(shared: &Shared, ctx: &mut WorkerContext<'_>, cancel: &CancellationToken) {
    let action = shared.lock_stats().bandits.action.pick(ctx.rng);

    match action {
        Action::Ddl => {
            shared.lock_stats().counters.sql_attempted += 1;
            if ddl::execute_ddl(shared, ctx.conn, ctx.rng, cancel).await.is_some() {
                shared.lock_stats().counters.sql_valid += 1;
            }
            shared.lock_stats().bandits.action.update(Action::Ddl, 0.0);
        }
        Action::Dml => run_dml(shared, ctx, cancel).await,
        Action::Query => run_query(shared, ctx, cancel).await,
    }
}

async fn run_dml(shared: &Shared, ctx: &mut WorkerContext<'_>, cancel: &CancellationToken) {
    let action = shared.lock_stats().bandits.dml.pick(ctx.rng);
    shared.lock_stats().counters.sql_attempted += 1;

    let outcome = dml::execute_dml(shared, ctx.conn, ctx.rng, action, cancel).await;
    let reward = match outcome {
        None => 0.0,
        Some(Ok(_)) => {
            shared.lock_stats().counters.sql_valid += 1;
            0.0
        }
        Some(Err(err)) => match classify_statement_error(&err) {
            StatementOutcome::Ignore => 0.0,
            StatementOutcome::Retry => 0.0,
            StatementOutcome::Capture => 1.0,
        },
    };

    let mut stats = shared.lock_stats();
    stats.bandits.dml.update(action, reward);
    stats.bandits.action.update(Action::Dml, reward);
}

async fn run_query(shared: &Shared, ctx: &mut WorkerContext<'_>, cancel: &CancellationToken) {
    let outcome = query::execute_query(
        shared,
        ctx.conn,
        ctx.rng,
        ctx.oracle_set,
        ctx.param_gen,
        ctx.base_gen,
        ctx.histogram,
        cancel,
    )
    .await;

    shared.lock_stats().counters.sql_attempted += 1;
    let result = outcome.result();
    let captured = !result.ok;
    if !captured {
        shared.lock_stats().counters.sql_valid += 1;
    }
    shared.lock_stats().bandits.action.update(Action::Query, if captured { 1.0 } else { 0.0 });

    if !captured {
        return;
    }

    let seed_ctx = SummaryContext {
        seed: shared.config.seed.wrapping_add(ctx.index as u64),
        ..Default::default()
    };
    let kind = outcome.kind();
    let result = outcome.result().clone();
    match capture::capture(shared, ctx.conn, kind, &result, &ctx.base_database, seed_ctx, cancel).await {
        Ok(report) => tracing::warn!(case_dir = %report.case_dir.display(), "captured"),
        Err(err) => tracing::error!(error = %err, "failed to write case artifacts"),
    }

    match rotation::rotate(shared, ctx.conn, &ctx.base_database, cancel).await {
        Ok(name) => tracing::info!(database = %name, "rotated"),
        Err(err) => tracing::error!(error = %err, "rotation failed after exhausting retries"),
    }
}
