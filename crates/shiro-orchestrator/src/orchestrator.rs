//! Top-level wiring: acquires the base database, builds the shared state
//! once behind an `Arc`, and spawns one worker task per `config.workers`
//! alongside the stats ticker and the `dynamic_state.json` writer.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use shiro_config::ShiroConfig;
use shiro_executor::{AcceptAllValidator, Connection, Executor, MySqlExecutor, NullObserver};
use shiro_oracle::{CertOracle, GroundTruthOracle, ImpoOracle, OracleSet, SimpleGenerator};
use shiro_plancache::{SimpleParamGenerator, WarningHistogram};
use shiro_types::SchemaState;

use crate::error::OrchestratorError;
use crate::query::CERT_TOLERANCE;
use crate::state::{self, Shared};
use crate::worker::{self, WorkerContext};

const DEFAULT_DATABASE: &str = "shiro";

/// Owns the shared state and the executor every worker acquires a
/// connection from. `Orchestrator::new` does the one-time setup (base
/// database creation, initial empty schema); `run` fans out the workers and
/// background tasks and blocks until they all exit.
pub struct Orchestrator {
    shared: Arc<Shared>,
    executor: Arc<MySqlExecutor>,
    base_database: String,
}

impl Orchestrator {
    /// Connects once to create the base database (if it doesn't already
    /// exist) and builds the shared state around an empty schema for it.
    /// Workers acquire their own connections afterwards; this one is
    /// dropped once setup completes.
    pub async fn new(config: ShiroConfig) -> Result<Self, OrchestratorError> {
        let base_database =
            if config.database.is_empty() { DEFAULT_DATABASE.to_string() } else { config.database.clone() };

        let executor = Arc::new(MySqlExecutor::new(
            &config.dsn,
            Arc::new(AcceptAllValidator),
            Arc::new(NullObserver),
            config.statement_timeout_ms,
        ));

        let setup_cancel = CancellationToken::new();
        let mut conn = executor.acquire(&setup_cancel).await?;
        conn.exec_statement(&format!("CREATE DATABASE IF NOT EXISTS `{base_database}`"), &setup_cancel).await?;
        conn.exec_statement(&format!("USE `{base_database}`"), &setup_cancel).await?;
        drop(conn);

        let schema = SchemaState::new(base_database.clone());
        let shared = Arc::new(Shared::new(config, schema));

        Ok(Self { shared, executor, base_database })
    }

    pub fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Runs until every worker has completed its share of `iterations` (0
    /// meaning run until `cancel` fires), then cancels and joins the stats
    /// ticker and `dynamic_state.json` writer.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), OrchestratorError> {
        let iterations = self.shared.config.iterations;
        let workers = self.shared.config.workers.max(1);
        let per_worker = if iterations == 0 { 0 } else { iterations.div_ceil(workers as u64) };

        let mut worker_handles = Vec::with_capacity(workers as usize);
        for index in 0..workers {
            let shared = Arc::clone(&self.shared);
            let executor = Arc::clone(&self.executor);
            let base_database = self.base_database.clone();
            let worker_cancel = cancel.clone();
            worker_handles.push(tokio::spawn(async move {
                run_worker(shared, executor, base_database, index, per_worker, worker_cancel).await;
            }));
        }

        let ticker_shared = Arc::clone(&self.shared);
        let ticker_cancel = cancel.clone();
        let ticker_handle = tokio::spawn(async move { crate::ticker::run(&ticker_shared, &ticker_cancel).await });

        let dynamic_shared = Arc::clone(&self.shared);
        let dynamic_cancel = cancel.clone();
        let dynamic_handle =
            tokio::spawn(async move { crate::dynamic_state::run(&dynamic_shared, &dynamic_cancel).await });

        for handle in worker_handles {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "worker task panicked");
            }
        }

        // Iteration-bounded runs stop the workers on their own; make sure
        // the background tasks notice even if nobody else cancelled.
        cancel.cancel();
        let _ = ticker_handle.await;
        let _ = dynamic_handle.await;

        Ok(())
    }
}

async fn run_worker(
    shared: Arc<Shared>,
    executor: Arc<MySqlExecutor>,
    base_database: String,
    index: u32,
    iterations: u64,
    cancel: CancellationToken,
) {
    let mut conn = match executor.acquire(&cancel).await {
        Ok(conn) => conn,
        Err(err) => {
            tracing::error!(worker = index, error = %err, "worker failed to acquire a connection");
            return;
        }
    };

    let mut rng = state::worker_rng(shared.config.seed, index);
    let oracle_set = OracleSet::new(
        CertOracle::new(shared.config.oracles.cert_min_base_rows, CERT_TOLERANCE),
        ImpoOracle::new(shared.config.oracles.impo_max_rows),
        GroundTruthOracle::disabled(),
    );
    let mut param_gen = SimpleParamGenerator::new(shared.config.seed.wrapping_add(index as u64));
    let mut base_gen = SimpleGenerator::new(shared.config.seed.wrapping_add(index as u64));
    let mut histogram = WarningHistogram::new();

    let mut ctx = WorkerContext {
        index,
        conn: &mut *conn,
        rng: &mut rng,
        oracle_set: &oracle_set,
        param_gen: &mut param_gen,
        base_gen: &mut base_gen,
        histogram: &mut histogram,
        base_database,
    };

    worker::run(&shared, &mut ctx, iterations, &cancel).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiro_config::ShiroConfig;

    #[tokio::test]
    async fn new_fails_fast_on_an_unreachable_dsn() {
        let mut config = ShiroConfig::default();
        config.dsn = "127.0.0.1:1".to_string();
        let result = Orchestrator::new(config).await;
        assert!(result.is_err());
    }
}
