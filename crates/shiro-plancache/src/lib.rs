//! The plan-cache oracle (§4.5): a differential protocol between a
//! concrete-SQL execution and repeated executions of its prepared form,
//! plus the row fingerprint and warning-classification machinery it
//! shares with nothing else in the workspace (PREPARE/EXECUTE state is
//! unique to this oracle; see `shiro-oracle`'s `DESIGN.md` entry for why
//! it lives in its own crate).

pub mod generator;
pub mod materialize;
pub mod protocol;
pub mod warnings;

pub use generator::{ParamGenerator, ParamQuery, SimpleParamGenerator};
pub use materialize::{materialize, sql_literal};
pub use protocol::{PlanCacheConfig, PlanCacheContext, PlanCacheOracle, MAX_FIRST_EXECUTE_RETRIES};
pub use warnings::{normalize_warning, WarningHistogram};
