//! Error classification and false-positive downgrade rules (§4.4 "Error
//! handling", §7 "Classification").
//!
//! DDL/DML failures are classified straight off [`ExecutorError::class`]:
//! whitelisted errors are generator faults and get swallowed, infra errors
//! get retried/rotated around, server errors are the interesting case.
//! Oracle results have already flattened their error into a string by the
//! time they reach the orchestrator (`OracleResult::error` takes
//! `err.to_string()`), so the oracle-side rules work off that text instead.

use shiro_executor::ExecutorError;
use shiro_oracle::OracleKind;
use shiro_types::{Detail, OracleResult};

/// What the worker loop should do with a failed DDL/DML statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementOutcome {
    /// Generator fault (bad syntax, FK violation, truncated value): drop
    /// it and move on, nothing worth logging.
    Ignore,
    /// Connectivity/topology fault: worth a rotation/backoff, not a bug.
    Retry,
    /// Unrecognized server error: capture it.
    Capture,
}

pub fn classify_statement_error(err: &ExecutorError) -> StatementOutcome {
    match err.class() {
        shiro_executor::ErrorClass::Whitelisted => StatementOutcome::Ignore,
        shiro_executor::ErrorClass::Infra => StatementOutcome::Retry,
        shiro_executor::ErrorClass::Server => StatementOutcome::Capture,
    }
}

/// Known-benign substrings that demote an oracle-reported error from "bug"
/// to "skip" for a specific oracle. Each is paired with the oracle kinds
/// it applies to, since the same message can be a real bug for one oracle
/// and noise for another (e.g. a timed-out planner hint only affects DQP's
/// `IGNORE_INDEX` probe).
const DQP_TIMEOUT_SUBSTRINGS: &[&str] = &["timed out", "timeout", "query execution was interrupted"];
const MISSING_COLUMN_SUBSTRINGS: &[&str] = &["unknown column", "no such column"];

/// Demotes a handful of known false-positive shapes before the result
/// reaches capture. Mutates `ok`/`details` in place; leaves everything
/// else (expected/actual/statements) untouched so the case is still
/// inspectable if the downgrade turns out to be wrong.
///
/// - DQP's `IGNORE_INDEX` probe can make the planner pick a much slower
///   join order; a timeout there is a planner-cost artifact, not a
///   correctness bug.
/// - IMPO and DQE both rewrite a query around a column the base query
///   referenced; if the schema shifted under a concurrent DDL action
///   between the base and the rewritten statement, "unknown column" is a
///   race with our own DDL stream, not the engine's fault.
///
/// GroundTruth's own low-confidence fallback (row-count-only comparison
/// when Impo can't extract a join signature) is handled inside
/// `GroundTruthOracle` itself and needs no rule here.
pub fn downgrade_false_positive(kind: OracleKind, result: &mut OracleResult) {
    if result.ok {
        return;
    }
    let Some(error) = result.error.as_deref() else { return };
    let lower = error.to_ascii_lowercase();

    let downgrade = match kind {
        OracleKind::Dqp => DQP_TIMEOUT_SUBSTRINGS.iter().any(|s| lower.contains(s)),
        OracleKind::Impo | OracleKind::Dqe => MISSING_COLUMN_SUBSTRINGS.iter().any(|s| lower.contains(s)),
        _ => false,
    };
    if !downgrade {
        return;
    }

    result.ok = true;
    result.details.push(Detail::SkipReason(error.clone()));
}

/// Attaches a human-facing [`Detail::ErrorReason`] and, for a handful of
/// recognizable crash signatures, a [`Detail::BugHint`]. Best-effort: an
/// oracle error with no recognizable shape still gets the `ErrorReason`
/// but no hint.
pub fn annotate_error(result: &mut OracleResult) {
    let Some(error) = result.error.clone() else { return };
    result.details.push(Detail::ErrorReason(error.clone()));

    let lower = error.to_ascii_lowercase();
    let hint = if lower.contains("panic") {
        Some("server panic")
    } else if lower.contains("assertion") {
        Some("server assertion failure")
    } else if lower.contains("deadlock") {
        Some("deadlock detected")
    } else if lower.contains("out of range") || lower.contains("overflow") {
        Some("numeric overflow")
    } else {
        None
    };
    if let Some(hint) = hint {
        result.details.push(Detail::BugHint(hint.to_string()));
    }
}
