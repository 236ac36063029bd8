//! The four disjoint lock domains shared across workers: `gen_mu` guards
//! the schema and generator-side adaptive weights, `qpg_mu` guards QPG
//! coverage plus the seen-SQL dedup cache, `kqe_mu` guards the KQE-lite
//! sibling, and `stats_mu` guards every bandit plus run counters and the
//! last-seen error examples. Whenever more than one is needed they are
//! always acquired in this order: gen, qpg, kqe, stats.

use std::sync::{Mutex, MutexGuard};

use rand::rngs::SmallRng;
use rand::SeedableRng;

use shiro_bandit::{ActionBandit, DmlBandit, FeatureBandit, FeatureLevels, OracleBandit};
use shiro_config::ShiroConfig;
use shiro_coverage::{KqeTracker, QpgThresholds, QpgTracker, SeenSqlCache};
use shiro_report::InsertRing;
use shiro_types::SchemaState;

/// Schema plus the process-wide database rotation sequence. Shared because
/// DDL mutates the schema from whichever worker picks it, and every worker
/// needs the current table set to generate DML/queries.
pub struct GenerationState {
    pub schema: SchemaState,
    pub db_seq: u64,
    /// Every DDL statement executed against the current schema incarnation,
    /// in order. Joined with `;\n` to reconstruct `schema.sql` on capture
    /// and cleared on rotation (§4.7, §5).
    pub ddl_log: Vec<String>,
    /// Monotonic name counters reserved while `gen_mu` is held and before a
    /// DDL statement is sent, so two workers never generate the same
    /// object name even though the actual schema mutation is committed
    /// only after the statement succeeds (DDL execution itself must not
    /// hold `gen_mu` across an `.await`).
    pub table_seq: u64,
    pub index_seq: u64,
    pub view_seq: u64,
    pub fk_seq: u64,
    pub check_seq: u64,
    /// Recent `INSERT` statements against the current schema incarnation,
    /// replayed verbatim into `inserts.sql` on capture (§4.7) and cleared
    /// on rotation alongside `ddl_log`.
    pub insert_ring: InsertRing,
}

impl GenerationState {
    pub fn schema_sql(&self) -> String {
        let mut out = String::new();
        for stmt in &self.ddl_log {
            out.push_str(stmt.trim_end().trim_end_matches(';'));
            out.push_str(";\n");
        }
        out
    }

    /// Swaps in a fresh schema incarnation after rotation, clearing every
    /// counter/log tied to the one being replaced. `insert_ring_capacity`
    /// is `config.max_insert_statements`, threaded in rather than read
    /// from a shared config reference since this runs under `gen_mu`.
    pub fn reset_for_rotation(&mut self, schema: SchemaState, db_seq: u64, insert_ring_capacity: usize) {
        self.schema = schema;
        self.db_seq = db_seq;
        self.ddl_log.clear();
        self.table_seq = 0;
        self.index_seq = 0;
        self.view_seq = 0;
        self.fk_seq = 0;
        self.check_seq = 0;
        self.insert_ring = InsertRing::new(insert_ring_capacity);
    }
}

/// QPG coverage tracker and its seen-SQL dedup cache; these are observed
/// together after every successful query.
pub struct QpgState {
    pub tracker: QpgTracker,
    pub seen_sql: SeenSqlCache,
}

/// Run-wide counters driving the periodic stats line and `logging.metrics`
/// threshold warnings (§7), plus the four adaptive bandits (§5: "Bandits
/// are internally synchronized by `statsMu`").
#[derive(Default)]
pub struct Counters {
    pub sql_attempted: u64,
    pub sql_valid: u64,
    pub impo_total: u64,
    pub impo_invalid_columns: u64,
    pub impo_base_exec_failed: u64,
    pub captures: u64,
    pub rotations: u64,
}

impl Counters {
    pub fn sql_valid_ratio(&self) -> f64 {
        if self.sql_attempted == 0 {
            1.0
        } else {
            self.sql_valid as f64 / self.sql_attempted as f64
        }
    }

    pub fn impo_invalid_columns_ratio(&self) -> f64 {
        if self.impo_total == 0 {
            0.0
        } else {
            self.impo_invalid_columns as f64 / self.impo_total as f64
        }
    }

    pub fn impo_base_exec_failed_ratio(&self) -> f64 {
        if self.impo_total == 0 {
            0.0
        } else {
            self.impo_base_exec_failed as f64 / self.impo_total as f64
        }
    }
}

pub struct Bandits {
    pub action: ActionBandit,
    pub dml: DmlBandit,
    pub oracle: OracleBandit,
    pub feature: FeatureBandit,
}

pub struct StatsState {
    pub counters: Counters,
    pub bandits: Bandits,
    pub last_errors: Vec<String>,
}

/// The shared state four lock domains guard, plus the immutable config
/// every worker reads from. Built once in [`crate::orchestrator::Orchestrator::new`]
/// and handed to every worker behind an `Arc`.
pub struct Shared {
    pub config: ShiroConfig,
    gen: Mutex<GenerationState>,
    qpg: Mutex<QpgState>,
    kqe: Mutex<KqeTracker>,
    stats: Mutex<StatsState>,
}

macro_rules! trace_lock {
    ($domain:literal, $phase:literal) => {
        #[cfg(debug_assertions)]
        tracing::trace!(domain = $domain, phase = $phase, "lock domain");
    };
}

impl Shared {
    pub fn new(config: ShiroConfig, schema: SchemaState) -> Self {
        let adaptive = &config.adaptive;
        let weights = &config.weights;
        let window = if adaptive.window_size == 0 { None } else { Some(adaptive.window_size as usize) };

        let bandits = Bandits {
            action: ActionBandit::new(
                [weights.actions.ddl as i64, weights.actions.dml as i64, weights.actions.query as i64],
                adaptive.ucb_exploration,
                window,
                adaptive.enabled && adaptive.adapt_actions,
            ),
            dml: DmlBandit::new(
                [weights.dml.insert as i64, weights.dml.update as i64, weights.dml.delete as i64],
                adaptive.ucb_exploration,
                window,
                adaptive.enabled && adaptive.adapt_dml,
            ),
            oracle: OracleBandit::new(
                [
                    weights.oracles.norec as i64,
                    weights.oracles.tlp as i64,
                    weights.oracles.dqp as i64,
                    weights.oracles.coddtest as i64,
                    weights.oracles.dqe as i64,
                    weights.oracles.impo as i64,
                    weights.oracles.groundtruth as i64,
                ],
                cert_rate(weights.oracles.cert),
                adaptive.ucb_exploration,
                window,
                adaptive.enabled && adaptive.adapt_oracles,
            ),
            feature: FeatureBandit::new(
                FeatureLevels::default(),
                adaptive.ucb_exploration,
                window,
                adaptive.enabled && adaptive.adapt_features,
            ),
        };

        Self {
            qpg: Mutex::new(QpgState {
                tracker: QpgTracker::new(QpgThresholds::default()),
                seen_sql: SeenSqlCache::new(
                    std::time::Duration::from_secs(config.qpg.seen_sql_ttl_seconds.max(1)),
                    config.qpg.seen_sql_max as usize,
                    std::time::Duration::from_secs(config.qpg.seen_sql_sweep_seconds.max(1)),
                ),
            }),
            kqe: Mutex::new(KqeTracker::default()),
            stats: Mutex::new(StatsState {
                counters: Counters::default(),
                bandits,
                last_errors: Vec::new(),
            }),
            gen: Mutex::new(GenerationState {
                schema,
                db_seq: 0,
                ddl_log: Vec::new(),
                table_seq: 0,
                index_seq: 0,
                view_seq: 0,
                fk_seq: 0,
                check_seq: 0,
                insert_ring: InsertRing::new(config.max_insert_statements as usize),
            }),
            config,
        }
    }

    pub fn lock_gen(&self) -> MutexGuard<'_, GenerationState> {
        trace_lock!("gen", "acquire");
        self.gen.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn lock_qpg(&self) -> MutexGuard<'_, QpgState> {
        trace_lock!("qpg", "acquire");
        self.qpg.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn lock_kqe(&self) -> MutexGuard<'_, KqeTracker> {
        trace_lock!("kqe", "acquire");
        self.kqe.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn lock_stats(&self) -> MutexGuard<'_, StatsState> {
        trace_lock!("stats", "acquire");
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// §4.4: CERT is sampled deterministically at a tiny rate rather than
/// competing as a bandit arm. The configured integer weight is reinterpreted
/// as a sampling probability out of the sum of all nine oracle weights, or
/// a flat 1% when every weight (including CERT's) is zero.
fn cert_rate(cert_weight: u32) -> f64 {
    if cert_weight == 0 {
        0.01
    } else {
        (cert_weight as f64 / 100.0).clamp(0.0, 1.0)
    }
}

/// Per-worker RNG, derived from `Seed + worker_index` (§4.6 "Concurrency"),
/// never shared across workers.
pub fn worker_rng(seed: u64, worker_index: u32) -> SmallRng {
    SmallRng::seed_from_u64(seed.wrapping_add(worker_index as u64))
}
