//! Core data model shared across Shiro: schema state, scalar values, oracle
//! results and replay specs.
//!
//! Nothing in this crate talks to a network socket or a filesystem — it is
//! the plain-data layer every other crate in the workspace builds on.

pub mod error;
pub mod oracle_result;
pub mod replay;
pub mod schema;
pub mod signature;
pub mod value;

pub use error::ShiroError;
pub use oracle_result::{Detail, GroundTruthCheck, OracleResult};
pub use replay::{ReplayKind, ReplaySpec};
pub use schema::{Column, ColumnCategory, ColumnType, ForeignKey, Index, SchemaError, SchemaState, Table, TableKind};
pub use signature::{compute_signature, Signature};
pub use value::Value;
