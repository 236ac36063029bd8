//! The `Oracle` trait and the reference set of differential SQL oracles.
//!
//! Per the design, the SQL generator's grammar is an external collaborator:
//! this crate depends only on the small [`Generator`] contract, not on any
//! concrete grammar. Each oracle borrows a [`Connection`] from the executor,
//! asks the generator for a base query shaped by a [`FeatureBias`], issues
//! one or more reformulations of it, and folds the result into an
//! [`OracleResult`].

pub mod cert;
pub mod coddtest;
pub mod context;
pub mod dqe;
pub mod dqp;
pub mod generator;
pub mod groundtruth;
pub mod impo;
pub mod norec;
pub mod oracle;
pub mod registry;
pub mod tlp;

pub use cert::CertOracle;
pub use coddtest::CoddTestOracle;
pub use context::OracleContext;
pub use dqe::DqeOracle;
pub use dqp::DqpOracle;
pub use generator::{FeatureBias, GeneratedQuery, Generator, SimpleGenerator};
pub use groundtruth::GroundTruthOracle;
pub use impo::ImpoOracle;
pub use norec::NoRecOracle;
pub use oracle::Oracle;
pub use registry::{OracleKind, OracleSet};
pub use tlp::TlpOracle;
