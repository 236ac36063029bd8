//! The recognized sections of the configuration file, each with a
//! documented default so a user only has to specify what they want to
//! change.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_workers() -> u32 {
    4
}

fn default_zero_u64() -> u64 {
    0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiroConfig {
    pub dsn: String,
    pub database: String,
    pub seed: u64,
    pub iterations: u64,
    #[serde(default = "default_workers")]
    pub workers: u32,

    pub plan_cache_only: bool,
    pub plan_cache_prob: i32,
    pub non_prepared_plan_cache_prob: i32,

    pub max_tables: u32,
    pub max_join_tables: u32,
    pub max_columns: u32,
    pub max_rows_per_table: u64,
    pub max_insert_statements: u32,
    pub statement_timeout_ms: u64,

    pub plan_replayer: PlanReplayerConfig,
    pub storage: StorageConfig,
    pub features: FeatureFlags,
    pub weights: Weights,
    pub adaptive: AdaptiveConfig,
    pub logging: LoggingConfig,
    pub oracles: OraclesConfig,
    pub qpg: QpgConfig,
    pub kqe: KqeConfig,
    pub tqs: TqsConfig,
    pub signature: SignatureConfig,
    pub minimize: MinimizeConfig,
}

impl Default for ShiroConfig {
    fn default() -> Self {
        Self {
            dsn: "127.0.0.1:4000".to_string(),
            database: String::new(),
            seed: 0,
            iterations: 0,
            workers: default_workers(),
            plan_cache_only: false,
            plan_cache_prob: 50,
            non_prepared_plan_cache_prob: 50,
            max_tables: 8,
            max_join_tables: 4,
            max_columns: 10,
            max_rows_per_table: 1000,
            max_insert_statements: 50,
            statement_timeout_ms: 15_000,
            plan_replayer: PlanReplayerConfig::default(),
            storage: StorageConfig::default(),
            features: FeatureFlags::default(),
            weights: Weights::default(),
            adaptive: AdaptiveConfig::default(),
            logging: LoggingConfig::default(),
            oracles: OraclesConfig::default(),
            qpg: QpgConfig::default(),
            kqe: KqeConfig::default(),
            tqs: TqsConfig::default(),
            signature: SignatureConfig::default(),
            minimize: MinimizeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanReplayerConfig {
    pub enabled: bool,
    pub download_url_template: String,
    pub output_dir: String,
    pub timeout_seconds: u64,
    pub max_download_bytes: u64,
}

impl Default for PlanReplayerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            download_url_template: String::new(),
            output_dir: "cases".to_string(),
            timeout_seconds: 30,
            max_download_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    pub enabled: bool,
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub prefix: String,
    pub credentials: String,
    pub use_path_style: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub s3: S3Config,
    /// Per-table row cap for `data.tsv` on a captured case; large tables
    /// are sampled rather than dumped in full.
    pub max_data_dump_rows: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            s3: S3Config::default(),
            max_data_dump_rows: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    #[serde(default = "default_true")]
    pub cte: bool,
    #[serde(default = "default_true")]
    pub joins: bool,
    #[serde(default = "default_true")]
    pub subqueries: bool,
    #[serde(default = "default_true")]
    pub aggregates: bool,
    #[serde(default = "default_true")]
    pub group_by: bool,
    #[serde(default = "default_true")]
    pub having: bool,
    #[serde(default = "default_true")]
    pub order_by: bool,
    #[serde(default = "default_true")]
    pub limit: bool,
    #[serde(default = "default_true")]
    pub distinct: bool,
    pub views: bool,
    #[serde(default = "default_true")]
    pub indexes: bool,
    #[serde(default = "default_true")]
    pub foreign_keys: bool,
    pub check_constraints: bool,
    pub partition_tables: bool,
    #[serde(default = "default_true")]
    pub not_exists: bool,
    #[serde(default = "default_true")]
    pub not_in: bool,
    #[serde(default = "default_true")]
    pub plan_cache: bool,
    pub non_prepared_plan_cache: bool,
    #[serde(default = "default_true")]
    pub window_functions: bool,
    pub correlated_subqueries: bool,
    pub dsg: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            cte: true,
            joins: true,
            subqueries: true,
            aggregates: true,
            group_by: true,
            having: true,
            order_by: true,
            limit: true,
            distinct: true,
            views: false,
            indexes: true,
            foreign_keys: true,
            check_constraints: false,
            partition_tables: false,
            not_exists: true,
            not_in: true,
            plan_cache: true,
            non_prepared_plan_cache: false,
            window_functions: true,
            correlated_subqueries: false,
            dsg: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionWeights {
    pub ddl: u32,
    pub dml: u32,
    pub query: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmlWeights {
    pub insert: u32,
    pub update: u32,
    pub delete: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleWeights {
    pub norec: u32,
    pub tlp: u32,
    pub dqp: u32,
    pub cert: u32,
    pub coddtest: u32,
    pub dqe: u32,
    pub impo: u32,
    pub groundtruth: u32,
    pub plancache: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureWeights {
    pub join_count: u32,
    pub cte_count: u32,
    pub subquery_count: u32,
    pub agg_prob: u32,
    pub decimal_agg_prob: u32,
    pub group_by_prob: u32,
    pub having_prob: u32,
    pub order_by_prob: u32,
    pub limit_prob: u32,
    pub distinct_prob: u32,
    pub window_prob: u32,
    pub partition_prob: u32,
    pub not_exists_prob: u32,
    pub not_in_prob: u32,
    pub index_prefix_prob: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub actions: ActionWeights,
    pub dml: DmlWeights,
    pub oracles: OracleWeights,
    pub features: FeatureWeights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub enabled: bool,
    pub ucb_exploration: f64,
    pub window_size: u32,
    pub adapt_actions: bool,
    pub adapt_oracles: bool,
    pub adapt_dml: bool,
    pub adapt_features: bool,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ucb_exploration: std::f64::consts::SQRT_2,
            window_size: 200,
            adapt_actions: true,
            adapt_oracles: true,
            adapt_dml: true,
            adapt_features: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsThresholds {
    pub sql_valid_min_ratio: f64,
    pub impo_invalid_columns_max_ratio: f64,
    pub impo_base_exec_failed_max_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose: bool,
    pub report_interval_seconds: u64,
    pub log_file: String,
    pub metrics: MetricsThresholds,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            report_interval_seconds: 60,
            log_file: "logs/shiro.log".to_string(),
            metrics: MetricsThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OraclesConfig {
    pub strict_predicates: bool,
    pub predicate_level: u32,
    pub cert_min_base_rows: u64,
    pub groundtruth_max_rows: u64,
    pub impo_max_rows: u64,
    pub impo_max_mutations: u32,
    pub impo_timeout_ms: u64,
    pub impo_disable_stage1: bool,
    pub impo_keep_lr_join: bool,
}

impl Default for OraclesConfig {
    fn default() -> Self {
        Self {
            strict_predicates: true,
            predicate_level: 2,
            cert_min_base_rows: 10,
            groundtruth_max_rows: 10_000,
            impo_max_rows: 10_000,
            impo_max_mutations: 32,
            impo_timeout_ms: 10_000,
            impo_disable_stage1: false,
            impo_keep_lr_join: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QpgConfig {
    pub enabled: bool,
    pub explain_format: String,
    pub mutation_prob: f64,
    pub seen_sql_ttl_seconds: u64,
    pub seen_sql_max: u64,
    pub seen_sql_sweep_seconds: u64,
}

impl Default for QpgConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            explain_format: "brief".to_string(),
            mutation_prob: 0.1,
            seen_sql_ttl_seconds: 3600,
            seen_sql_max: 100_000,
            seen_sql_sweep_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KqeConfig {
    pub enabled: bool,
}

impl Default for KqeConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TqsConfig {
    pub enabled: bool,
    pub wide_rows: u32,
    pub dim_tables: u32,
    pub dep_columns: u32,
    pub payload_columns: u32,
    pub walk_length: u32,
    pub walk_min: u32,
    pub walk_max: u32,
    pub gamma: f64,
}

impl Default for TqsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            wide_rows: 10_000,
            dim_tables: 3,
            dep_columns: 4,
            payload_columns: 4,
            walk_length: 6,
            walk_min: 2,
            walk_max: 10,
            gamma: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    pub round_scale: i32,
    pub plan_cache_round_scale: i32,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            round_scale: 2,
            plan_cache_round_scale: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimizeConfig {
    pub enabled: bool,
    pub max_rounds: u32,
    #[serde(default = "default_zero_u64")]
    pub timeout_seconds: u64,
    pub merge_inserts: bool,
}

impl Default for MinimizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_rounds: 50,
            timeout_seconds: 60,
            merge_inserts: true,
        }
    }
}
