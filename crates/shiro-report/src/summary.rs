//! `summary.json`: the stable key set documented in §4.7, derived from an
//! [`OracleResult`] plus the capture-time context the orchestrator and
//! reporter supply (seed, timestamp, case directory, optional artifacts).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shiro_types::{Detail, OracleResult, ReplaySpec};

/// Everything [`Summary`] needs beyond what's already on the
/// [`OracleResult`] itself.
#[derive(Debug, Clone, Default)]
pub struct SummaryContext {
    pub replay_spec: Option<ReplaySpec>,
    pub seed: u64,
    pub case_dir: String,
    pub plan_replayer_path: Option<String>,
    pub upload_location: Option<String>,
    pub tidb_version: Option<String>,
    pub plan_signature: Option<u64>,
    pub plan_signature_format: Option<String>,
    /// `true` when the captured result's expected/actual `EXPLAIN` text
    /// normalizes identically -- the capture may just be nondeterministic
    /// plan choice, not a real bug (§4.7).
    pub flaky: bool,
    /// Per-oracle optional fields (e.g. NoREC's optimized/unoptimized/
    /// predicate trio), passed straight through as JSON.
    pub oracle_fields: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub oracle: String,
    pub sql: Vec<String>,
    pub expected: String,
    pub actual: String,
    pub error: Option<String>,
    pub error_reason: Option<String>,
    pub bug_hint: Option<String>,
    pub replay_sql: Option<ReplaySpec>,
    pub flaky: bool,
    pub details: BTreeMap<String, String>,
    pub seed: u64,
    pub timestamp: DateTime<Utc>,
    pub plan_replayer: Option<String>,
    pub upload_location: Option<String>,
    pub case_dir: String,
    pub tidb_version: Option<String>,
    pub plan_signature: Option<u64>,
    pub plan_signature_format: Option<String>,
    #[serde(flatten)]
    pub oracle_fields: BTreeMap<String, serde_json::Value>,
}

impl Summary {
    pub fn from_result(result: &OracleResult, ctx: SummaryContext) -> Self {
        let mut error_reason = None;
        let mut bug_hint = None;
        let mut skip_reason = None;
        let mut details = BTreeMap::new();

        for detail in &result.details {
            match detail {
                Detail::ErrorReason(reason) => error_reason = Some(reason.clone()),
                Detail::BugHint(hint) => bug_hint = Some(hint.clone()),
                Detail::SkipReason(reason) => skip_reason = Some(reason.clone()),
                Detail::ReplayKind(kind) => {
                    details.insert("replay_kind".to_string(), kind.clone());
                }
                Detail::ReplaySql { expected, actual } => {
                    details.insert("replay_sql_expected".to_string(), expected.clone());
                    details.insert("replay_sql_actual".to_string(), actual.clone());
                }
                Detail::ReplaySetVar { name, value } => {
                    details.insert("replay_set_var".to_string(), format!("{name}={value}"));
                }
                Detail::ReplayTolerance(tol) => {
                    details.insert("replay_tolerance".to_string(), tol.to_string());
                }
                Detail::ReplayMaxRows(max) => {
                    details.insert("replay_max_rows".to_string(), max.to_string());
                }
                Detail::ReplayImpoIsUpper(is_upper) => {
                    details.insert("replay_impo_is_upper".to_string(), is_upper.to_string());
                }
                Detail::Passthrough(map) => {
                    for (k, v) in map {
                        details.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        if let Some(reason) = skip_reason {
            details.insert("skip_reason".to_string(), reason);
        }
        for (k, v) in &result.metrics {
            details.insert(format!("metric.{k}"), v.to_string());
        }

        Self {
            oracle: result.oracle_name.clone(),
            sql: result.statements.clone(),
            expected: result.expected.clone(),
            actual: result.actual.clone(),
            error: result.error.clone(),
            error_reason,
            bug_hint,
            replay_sql: ctx.replay_spec,
            flaky: ctx.flaky,
            details,
            seed: ctx.seed,
            timestamp: Utc::now(),
            plan_replayer: ctx.plan_replayer_path,
            upload_location: ctx.upload_location,
            case_dir: ctx.case_dir,
            tidb_version: ctx.tidb_version,
            plan_signature: ctx.plan_signature,
            plan_signature_format: ctx.plan_signature_format,
            oracle_fields: ctx.oracle_fields,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Equality that ignores `timestamp`, matching the idempotence
    /// property in §8 ("byte-identical modulo the timestamp field").
    pub fn eq_ignoring_timestamp(&self, other: &Summary) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        a.timestamp = b.timestamp;
        a.to_json_pretty().ok() == b.to_json_pretty().ok().map(|s| {
            // keep `b` immutable above; re-serialize once timestamps match.
            let _ = &mut b;
            s
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporting_twice_is_equal_modulo_timestamp() {
        let result = OracleResult::mismatch("NoREC", vec!["SELECT 1".into()], "1", "2");
        let ctx = SummaryContext {
            seed: 7,
            case_dir: "case_0000_x".to_string(),
            ..Default::default()
        };
        let a = Summary::from_result(&result, ctx.clone());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = Summary::from_result(&result, ctx);
        assert_ne!(a.timestamp, b.timestamp);
        assert!(a.eq_ignoring_timestamp(&b));
    }

    #[test]
    fn error_reason_and_bug_hint_are_pulled_out_of_details() {
        let result = OracleResult::error("DQP", vec![], "timeout")
            .with_detail(Detail::ErrorReason("timeout".to_string()))
            .with_detail(Detail::BugHint("dqp_timeout".to_string()));
        let summary = Summary::from_result(&result, SummaryContext::default());
        assert_eq!(summary.error_reason.as_deref(), Some("timeout"));
        assert_eq!(summary.bug_hint.as_deref(), Some("dqp_timeout"));
    }
}
