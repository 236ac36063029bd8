//! Replay specs: the minimal recipe needed to re-run a failing check
//! outside the original fuzzing run, and the shape the minimizer reduces.

use serde::{Deserialize, Serialize};

/// Which comparison a replay is supposed to repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayKind {
    Signature,
    Count,
    PlanRows,
    RowsAffected,
    ImpoContains,
    CaseError,
    ErrorSql,
}

/// A captured recipe for re-running one failing comparison.
///
/// Created at capture time, consumed by the minimizer and the repro-SQL
/// builder. The only mutation it ever undergoes after capture is the
/// minimizer shrinking one of `expected_sql`/`actual_sql` in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySpec {
    pub kind: ReplayKind,
    pub expected_sql: String,
    pub actual_sql: Option<String>,
    pub set_var: Option<(String, String)>,
    pub tolerance: Option<f64>,
    pub max_rows: Option<u64>,
}

impl ReplaySpec {
    pub fn new(kind: ReplayKind, expected_sql: impl Into<String>) -> Self {
        Self {
            kind,
            expected_sql: expected_sql.into(),
            actual_sql: None,
            set_var: None,
            tolerance: None,
            max_rows: None,
        }
    }

    pub fn with_actual(mut self, actual_sql: impl Into<String>) -> Self {
        self.actual_sql = Some(actual_sql.into());
        self
    }

    pub fn with_set_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_var = Some((name.into(), value.into()));
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn with_max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    /// All SQL statements this replay depends on, in execution order.
    pub fn statements(&self) -> Vec<&str> {
        let mut out = vec![self.expected_sql.as_str()];
        if let Some(actual) = &self.actual_sql {
            out.push(actual.as_str());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_optional_fields() {
        let spec = ReplaySpec::new(ReplayKind::Signature, "SELECT 1")
            .with_actual("SELECT /*+ NO_INDEX() */ 1")
            .with_tolerance(0.01)
            .with_max_rows(100);
        assert_eq!(spec.statements().len(), 2);
        assert_eq!(spec.tolerance, Some(0.01));
        assert_eq!(spec.max_rows, Some(100));
    }

    #[test]
    fn statements_without_actual_has_only_expected() {
        let spec = ReplaySpec::new(ReplayKind::CaseError, "SELECT 1/0");
        assert_eq!(spec.statements(), vec!["SELECT 1/0"]);
    }
}
