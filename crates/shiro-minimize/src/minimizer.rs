//! Top-level minimizer (§4.8): alternates delta-debugging and AST
//! rewrites under a scoring rule, gated by a base-replay consensus check,
//! for up to `max_rounds` or until the wall-clock budget expires.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use shiro_config::MinimizeConfig;
use shiro_types::{ReplayKind, ReplaySpec};

use crate::ddmin::{ddmin, ReplayTest};
use crate::predicate::base_replay_gate;
use crate::repro::build_repro_sql;
use crate::rewrite::rewrite_candidates;
use crate::scoring::score_of;

/// Replays `inserts` followed by `case_statements` against a freshly
/// recreated sibling database and reports whether the original failure
/// (mismatch, error, whatever the replay spec checks) is still
/// reproduced.
#[async_trait]
pub trait MinimizeTest: Send {
    async fn replay(&mut self, inserts: &[String], case_statements: &[String]) -> bool;
}

#[derive(Debug, Clone)]
pub enum MinimizeOutcome {
    Reduced {
        inserts: Vec<String>,
        case_statements: Vec<String>,
        flaky: bool,
        rounds: usize,
        repro_sql: String,
    },
    Skipped {
        reason: String,
    },
}

pub async fn minimize<M: MinimizeTest>(
    config: &MinimizeConfig,
    schema_sql: &str,
    mut inserts: Vec<String>,
    mut case_statements: Vec<String>,
    replay_spec: Option<ReplaySpec>,
    kind: ReplayKind,
    test: &mut M,
    cancel: &CancellationToken,
) -> MinimizeOutcome {
    let start = Instant::now();
    let budget = Duration::from_secs(config.timeout_seconds.max(1));

    let gate = {
        let inserts = &inserts;
        let case_statements = &case_statements;
        base_replay_gate(kind, || test.replay(inserts, case_statements)).await
    };
    if !gate.reproducible {
        return MinimizeOutcome::Skipped {
            reason: "base_replay_not_reproducible".to_string(),
        };
    }

    let mut rounds = 0usize;
    while rounds < config.max_rounds as usize && start.elapsed() < budget && !cancel.is_cancelled() {
        let mut changed = false;

        {
            let before = score_of(&case_statements);
            let mut adapter = CaseTest { inner: test, inserts: &inserts };
            let reduced = ddmin(case_statements.clone(), &mut adapter).await;
            if score_of(&reduced) < before {
                case_statements = reduced;
                changed = true;
            }
        }

        {
            let before = score_of(&inserts);
            let mut adapter = InsertsTest { inner: test, case_statements: &case_statements };
            let reduced = ddmin(inserts.clone(), &mut adapter).await;
            if score_of(&reduced) < before {
                inserts = reduced;
                changed = true;
            }
        }

        for idx in 0..case_statements.len() {
            let mut best = case_statements.clone();
            for candidate_sql in rewrite_candidates(&case_statements[idx]) {
                let mut trial = case_statements.clone();
                trial[idx] = candidate_sql;
                if score_of(&trial) < score_of(&best) && test.replay(&inserts, &trial).await {
                    best = trial;
                }
            }
            if best != case_statements {
                case_statements = best;
                changed = true;
            }
        }

        rounds += 1;
        tracing::debug!(rounds, changed, statements = case_statements.len(), "minimize round");
        if !changed {
            break;
        }
    }

    if config.merge_inserts {
        inserts = merge_inserts(inserts, &case_statements, test).await;
    }

    let repro_sql = build_repro_sql(schema_sql, &inserts, &case_statements, replay_spec.as_ref());
    tracing::info!(rounds, flaky = gate.flaky, inserts = inserts.len(), "minimized");

    MinimizeOutcome::Reduced {
        inserts,
        case_statements,
        flaky: gate.flaky,
        rounds,
        repro_sql,
    }
}

struct CaseTest<'a, M: MinimizeTest> {
    inner: &'a mut M,
    inserts: &'a [String],
}

#[async_trait]
impl<'a, M: MinimizeTest> ReplayTest<String> for CaseTest<'a, M> {
    async fn test(&mut self, candidate: &[String]) -> bool {
        self.inner.replay(self.inserts, candidate).await
    }
}

struct InsertsTest<'a, M: MinimizeTest> {
    inner: &'a mut M,
    case_statements: &'a [String],
}

#[async_trait]
impl<'a, M: MinimizeTest> ReplayTest<String> for InsertsTest<'a, M> {
    async fn test(&mut self, candidate: &[String]) -> bool {
        self.inner.replay(candidate, self.case_statements).await
    }
}

/// Merges consecutive `INSERT ... VALUES` statements that share the same
/// `INSERT INTO table (...)` prefix into one multi-row statement, keeping
/// the merge only when it still replays (`merge_inserts` pass).
async fn merge_inserts<M: MinimizeTest>(
    inserts: Vec<String>,
    case_statements: &[String],
    test: &mut M,
) -> Vec<String> {
    if inserts.len() < 2 {
        return inserts;
    }

    let mut merged = Vec::new();
    let mut i = 0;
    while i < inserts.len() {
        let Some((prefix, values)) = split_insert(&inserts[i]) else {
            merged.push(inserts[i].clone());
            i += 1;
            continue;
        };

        let mut group_values = vec![values];
        let mut j = i + 1;
        while j < inserts.len() {
            match split_insert(&inserts[j]) {
                Some((p2, v2)) if p2 == prefix => {
                    group_values.push(v2);
                    j += 1;
                }
                _ => break,
            }
        }

        if group_values.len() > 1 {
            let candidate_stmt = format!("{prefix} VALUES {}", group_values.join(", "));
            let mut candidate_inserts = merged.clone();
            candidate_inserts.push(candidate_stmt.clone());
            candidate_inserts.extend_from_slice(&inserts[j..]);
            if test.replay(&candidate_inserts, case_statements).await {
                merged.push(candidate_stmt);
                i = j;
                continue;
            }
        }

        merged.push(inserts[i].clone());
        i += 1;
    }

    merged
}

fn split_insert(stmt: &str) -> Option<(String, String)> {
    let upper = stmt.to_uppercase();
    let values_pos = upper.find(" VALUES ")?;
    let prefix = stmt[..values_pos].trim().to_string();
    let values = stmt[values_pos + 8..].trim().trim_end_matches(';').to_string();
    Some((prefix, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct KeepsStatementContaining(&'static str, AtomicUsize);

    #[async_trait]
    impl MinimizeTest for KeepsStatementContaining {
        async fn replay(&mut self, _inserts: &[String], case_statements: &[String]) -> bool {
            self.1.fetch_add(1, Ordering::SeqCst);
            case_statements.iter().any(|s| s.contains(self.0))
        }
    }

    #[tokio::test]
    async fn skips_when_base_replay_never_reproduces() {
        struct NeverReproduces;
        #[async_trait]
        impl MinimizeTest for NeverReproduces {
            async fn replay(&mut self, _inserts: &[String], _case_statements: &[String]) -> bool {
                false
            }
        }

        let mut test = NeverReproduces;
        let outcome = minimize(
            &MinimizeConfig::default(),
            "CREATE TABLE t (c0 INT)",
            vec![],
            vec!["SELECT 1".to_string()],
            None,
            ReplayKind::Signature,
            &mut test,
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(outcome, MinimizeOutcome::Skipped { reason } if reason == "base_replay_not_reproducible"));
    }

    #[tokio::test]
    async fn reduces_case_statements_to_the_one_the_predicate_needs() {
        let mut test = KeepsStatementContaining("KEEPME", AtomicUsize::new(0));
        let outcome = minimize(
            &MinimizeConfig::default(),
            "CREATE TABLE t (c0 INT)",
            vec![],
            vec!["SELECT 1".to_string(), "SELECT KEEPME".to_string(), "SELECT 3".to_string()],
            None,
            ReplayKind::Signature,
            &mut test,
            &CancellationToken::new(),
        )
        .await;

        match outcome {
            MinimizeOutcome::Reduced { case_statements, .. } => {
                assert_eq!(case_statements, vec!["SELECT KEEPME".to_string()]);
            }
            MinimizeOutcome::Skipped { .. } => panic!("expected a reduction"),
        }
    }

    #[test]
    fn split_insert_extracts_prefix_and_values() {
        let (prefix, values) = split_insert("INSERT INTO t0 (c0) VALUES (1)").unwrap();
        assert_eq!(prefix, "INSERT INTO t0 (c0)");
        assert_eq!(values, "(1)");
    }
}
