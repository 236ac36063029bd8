//! The result an oracle produces after checking one query group, plus the
//! tagged `details` payload that replaces a loosely-typed string map.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Free-form but *typed* facts attached to an [`OracleResult`]. Earlier
/// drafts of this type used a `HashMap<String, String>` for everything an
/// oracle might want to report; that made every consumer guess at which
/// keys could appear together. Each oracle now reports one of these
/// variants explicitly, with a `Passthrough` escape hatch for genuinely
/// free-form fields (see `DESIGN.md`, "tagged `details` variant").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Detail {
    SkipReason(String),
    ErrorReason(String),
    BugHint(String),
    ReplayKind(String),
    ReplaySql { expected: String, actual: String },
    ReplaySetVar { name: String, value: String },
    ReplayTolerance(f64),
    ReplayMaxRows(u64),
    ReplayImpoIsUpper(bool),
    Passthrough(BTreeMap<String, String>),
}

/// Ground-truth cross-check attached when the orchestrator ran a query
/// against the ground-truth DSG in addition to the SUT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthCheck {
    pub enabled: bool,
    pub mismatch: bool,
    pub row_count: u64,
    pub join_signature: u64,
}

/// The outcome of one oracle invocation against one query group.
///
/// Invariant: if `ok` is `false`, at least one of `error` being `Some` or
/// `expected != actual` must hold — an oracle cannot fail silently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleResult {
    pub oracle_name: String,
    pub statements: Vec<String>,
    pub expected: String,
    pub actual: String,
    pub error: Option<String>,
    pub ok: bool,
    pub ground_truth: Option<GroundTruthCheck>,
    pub metrics: BTreeMap<String, i64>,
    pub details: Vec<Detail>,
}

impl OracleResult {
    pub fn pass(oracle_name: impl Into<String>, statements: Vec<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            oracle_name: oracle_name.into(),
            statements,
            expected: value.clone(),
            actual: value,
            error: None,
            ok: true,
            ground_truth: None,
            metrics: BTreeMap::new(),
            details: Vec::new(),
        }
    }

    pub fn mismatch(
        oracle_name: impl Into<String>,
        statements: Vec<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            oracle_name: oracle_name.into(),
            statements,
            expected: expected.into(),
            actual: actual.into(),
            error: None,
            ok: false,
            ground_truth: None,
            metrics: BTreeMap::new(),
            details: Vec::new(),
        }
    }

    pub fn error(oracle_name: impl Into<String>, statements: Vec<String>, error: impl Into<String>) -> Self {
        Self {
            oracle_name: oracle_name.into(),
            statements,
            expected: String::new(),
            actual: String::new(),
            error: Some(error.into()),
            ok: false,
            ground_truth: None,
            metrics: BTreeMap::new(),
            details: Vec::new(),
        }
    }

    pub fn with_detail(mut self, detail: Detail) -> Self {
        self.details.push(detail);
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: i64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// Checks the invariant every `OracleResult` must uphold: a failure is
    /// never silent.
    pub fn check_invariant(&self) -> bool {
        if self.ok {
            true
        } else {
            self.error.is_some() || self.expected != self.actual
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_satisfies_invariant() {
        let r = OracleResult::pass("NoREC", vec!["SELECT 1".into()], "1");
        assert!(r.check_invariant());
        assert!(r.ok);
    }

    #[test]
    fn mismatch_satisfies_invariant() {
        let r = OracleResult::mismatch("TLP", vec![], "3", "2");
        assert!(r.check_invariant());
        assert!(!r.ok);
    }

    #[test]
    fn error_satisfies_invariant() {
        let r = OracleResult::error("DQP", vec![], "syntax error");
        assert!(r.check_invariant());
    }

    #[test]
    fn a_hand_built_silent_failure_fails_the_invariant_check() {
        let r = OracleResult {
            oracle_name: "bad".into(),
            statements: vec![],
            expected: "x".into(),
            actual: "x".into(),
            error: None,
            ok: false,
            ground_truth: None,
            metrics: BTreeMap::new(),
            details: vec![],
        };
        assert!(!r.check_invariant());
    }

    #[test]
    fn details_round_trip_through_json() {
        let d = Detail::ReplaySql {
            expected: "SELECT 1".into(),
            actual: "SELECT 2".into(),
        };
        let json = serde_json::to_string(&d).unwrap();
        let back: Detail = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
