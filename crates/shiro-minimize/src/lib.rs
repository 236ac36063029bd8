//! Case minimization (§4.8): a base-replay consensus gate, delta-debugging
//! over statement lists, AST-level SQL rewrites, and an optional insert-
//! merging pass, all under a strictly-decreasing scoring rule.

pub mod ddmin;
pub mod minimizer;
pub mod predicate;
pub mod repro;
pub mod rewrite;
pub mod scoring;

pub use ddmin::{ddmin, ReplayTest};
pub use minimizer::{minimize, MinimizeOutcome, MinimizeTest};
pub use predicate::{base_replay_gate, errors_match, ConsensusOutcome, ReplayError};
pub use repro::build_repro_sql;
pub use rewrite::rewrite_candidates;
pub use scoring::{improves, score, score_of};
