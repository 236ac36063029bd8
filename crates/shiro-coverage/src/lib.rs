//! Plan-shape coverage tracking: the QPG and KQE-lite controllers that
//! watch `EXPLAIN` output after each successful query and bias subsequent
//! query generation when coverage plateaus, plus the seen-SQL dedup cache
//! that skips re-observing a plan that can't have changed.

pub mod digest;
pub mod kqe;
pub mod normalize;
pub mod plan;
pub mod qpg;
pub mod seen_sql;

pub use digest::{compute_digests, PlanDigests};
pub use kqe::{KqeOverride, KqeTracker};
pub use normalize::normalize_plan_text;
pub use plan::{parse_explain_text, PlanNode};
pub use qpg::{AdaptiveWeights, QpgThresholds, QpgTracker};
pub use seen_sql::SeenSqlCache;
