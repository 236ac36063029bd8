//! Multi-armed bandits over action/oracle/DML choice and query features
//! (§4.4), plus the weighted-random fallback shared by all four.
//!
//! Each category wraps a plain [`ucb1::Bandit`] with a readable arm enum;
//! every wrapper degrades to [`ucb1::pick_weighted`] over its configured
//! integer weights when adaptive selection is disabled for that category
//! (`adaptive.adapt_actions`/`adapt_oracles`/`adapt_dml`/`adapt_features`).

pub mod action;
pub mod dml;
pub mod feature;
pub mod oracle;
pub mod ucb1;

pub use action::{Action, ActionBandit};
pub use dml::{Dml, DmlBandit};
pub use feature::{FeatureBandit, FeatureChoice, FeatureLevels};
pub use oracle::{OracleArm, OracleBandit, OraclePick};
pub use ucb1::{pick_weighted, Arm, Bandit};
