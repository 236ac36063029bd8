//! Minimizer replay harness (§4.8): `shiro_minimize::minimize` drives
//! reduction purely through `MinimizeTest::replay(inserts, case_statements)`
//! and knows nothing about oracles, so this adapter has to re-derive "is
//! the original mismatch still present" from flattened SQL text the same
//! way the originating oracle compared its own statements. Runs against a
//! `<base>_min` sibling database over the connection the worker already
//! holds -- minimization happens synchronously between capture and
//! rotation, so nothing else touches that connection meanwhile.
//!
//! Plan-cache and ground-truth captures are out of scope: plan-cache's
//! statement list carries prepared-statement/session state a flattened
//! replay can't faithfully reconstruct, and ground-truth runs with no
//! reference source wired in (`GroundTruthOracle::disabled()`) so it never
//! captures in this deployment. Both report not-reproducible, which sends
//! them through `MinimizeOutcome::Skipped` and leaves the original,
//! unreduced case as the artifact of record.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use shiro_executor::Connection;
use shiro_minimize::MinimizeTest;
use shiro_oracle::OracleKind;
use shiro_types::{compute_signature, Value};

fn as_i64(value: Option<Value>) -> i64 {
    match value {
        Some(Value::Int(i)) => i,
        Some(Value::UInt(u)) => u as i64,
        Some(Value::Double(d)) => d as i64,
        _ => 0,
    }
}

fn is_set_statement(stmt: &str) -> bool {
    stmt.trim_start().to_ascii_uppercase().starts_with("SET ")
}

/// Parses the first `estRows=<n>` token out of a textual EXPLAIN plan.
/// Mirrors `shiro_oracle::cert`'s own parser; CERT doesn't expose it, and
/// the harness needs it to replay a CERT capture's comparison.
fn parse_est_rows(explain_text: &str) -> Option<f64> {
    explain_text.split_whitespace().find_map(|tok| tok.strip_prefix("estRows=")?.parse::<f64>().ok())
}

fn fingerprint(row: &[Value]) -> Vec<u8> {
    row.iter().flat_map(Value::fingerprint_bytes).collect()
}

pub struct ReplayHarness<'a> {
    conn: &'a mut dyn Connection,
    schema_sql: String,
    database: String,
    kind: OracleKind,
    round_scale: u32,
    cert_tolerance: f64,
    cancel: CancellationToken,
}

impl<'a> ReplayHarness<'a> {
    pub fn new(
        conn: &'a mut dyn Connection,
        schema_sql: String,
        database: String,
        kind: OracleKind,
        round_scale: u32,
        cert_tolerance: f64,
        cancel: CancellationToken,
    ) -> Self {
        Self { conn, schema_sql, database, kind, round_scale, cert_tolerance, cancel }
    }

    async fn reset_database(&mut self) -> bool {
        let drop = format!("DROP DATABASE IF EXISTS `{}`", self.database);
        let _ = self.conn.exec_statement(&drop, &self.cancel).await;
        let create = format!("CREATE DATABASE `{}`", self.database);
        if self.conn.exec_statement(&create, &self.cancel).await.is_err() {
            return false;
        }
        let use_db = format!("USE `{}`", self.database);
        self.conn.exec_statement(&use_db, &self.cancel).await.is_ok()
    }

    async fn run_batch(&mut self, sql: &str) -> bool {
        for stmt in sql.split(';') {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            if self.conn.exec_statement(stmt, &self.cancel).await.is_err() {
                return false;
            }
        }
        true
    }

    async fn signature_of(&mut self, sql: &str) -> Option<shiro_types::Signature> {
        let rows = self.conn.exec_query(sql, &self.cancel).await.ok()?;
        Some(compute_signature(&rows, self.round_scale))
    }

    async fn row_count_of(&mut self, sql: &str) -> Option<i64> {
        Some(self.conn.exec_query(sql, &self.cancel).await.ok()?.len() as i64)
    }

    async fn scalar_of(&mut self, sql: &str) -> Option<i64> {
        Some(as_i64(self.conn.exec_scalar(sql, &self.cancel).await.ok()?))
    }

    /// NoREC: optimized query's row count against the unoptimized scalar
    /// rewrite's count.
    async fn check_norec(&mut self, statements: &[String]) -> bool {
        let [opt, unopt, ..] = statements else { return false };
        let Some(optimized) = self.row_count_of(opt).await else { return false };
        let Some(unoptimized) = self.scalar_of(unopt).await else { return false };
        optimized != unoptimized
    }

    /// TLP: the unpartitioned row count against the sum of the three
    /// ternary partitions.
    async fn check_tlp(&mut self, statements: &[String]) -> bool {
        let [total_sql, rest @ ..] = statements else { return false };
        if rest.is_empty() {
            return false;
        }
        let Some(total) = self.row_count_of(total_sql).await else { return false };
        let mut partition_sum = 0i64;
        for stmt in rest {
            let Some(count) = self.row_count_of(stmt).await else { return false };
            partition_sum += count;
        }
        total != partition_sum
    }

    /// Impo: every row the stronger (more selective) query returns must
    /// already be present in the weaker query's rows.
    async fn check_impo(&mut self, statements: &[String]) -> bool {
        let [weaker_sql, stronger_sql, ..] = statements else { return false };
        let Ok(weaker) = self.conn.exec_query(weaker_sql, &self.cancel).await else { return false };
        let Ok(stronger) = self.conn.exec_query(stronger_sql, &self.cancel).await else { return false };
        let weaker_set: HashSet<Vec<u8>> = weaker.iter().map(|row| fingerprint(row)).collect();
        stronger.iter().any(|row| !weaker_set.contains(&fingerprint(row)))
    }

    /// CERT: the planner's EXPLAIN row estimate against the query's actual
    /// row count, beyond `cert_tolerance`.
    async fn check_cert(&mut self, statements: &[String]) -> bool {
        let [explain_sql, query_sql, ..] = statements else { return false };
        let Ok(explain_rows) = self.conn.exec_query(explain_sql, &self.cancel).await else { return false };
        let explain_text =
            explain_rows.iter().flat_map(|row| row.iter().map(ToString::to_string)).collect::<Vec<_>>().join(" ");
        let Some(est_rows) = parse_est_rows(&explain_text) else { return false };
        let Some(actual_rows) = self.row_count_of(query_sql).await else { return false };
        est_rows > actual_rows as f64 * (1.0 + self.cert_tolerance)
    }

    /// DQP / CoddTest / DQE: run every statement, treating `SET ...`
    /// statements (session toggles, the DQE anchor) as setup rather than a
    /// comparison point, and compare the first and last query signatures
    /// collected.
    async fn check_signature_pair(&mut self, statements: &[String]) -> bool {
        let mut sigs = Vec::new();
        for stmt in statements {
            if is_set_statement(stmt) {
                let _ = self.conn.exec_statement(stmt, &self.cancel).await;
                continue;
            }
            match self.signature_of(stmt).await {
                Some(sig) => sigs.push(sig),
                None => return false,
            }
        }
        match (sigs.first(), sigs.last()) {
            (Some(first), Some(last)) if sigs.len() >= 2 => first != last,
            _ => false,
        }
    }

    async fn check(&mut self, statements: &[String]) -> bool {
        match self.kind {
            OracleKind::NoRec => self.check_norec(statements).await,
            OracleKind::Tlp => self.check_tlp(statements).await,
            OracleKind::Dqp | OracleKind::CoddTest | OracleKind::Dqe => self.check_signature_pair(statements).await,
            OracleKind::Impo => self.check_impo(statements).await,
            OracleKind::Cert => self.check_cert(statements).await,
            OracleKind::GroundTruth | OracleKind::PlanCache => false,
        }
    }
}

#[async_trait]
impl<'a> MinimizeTest for ReplayHarness<'a> {
    async fn replay(&mut self, inserts: &[String], case_statements: &[String]) -> bool {
        if !self.reset_database().await {
            return false;
        }
        let schema_sql = self.schema_sql.clone();
        if !self.run_batch(&schema_sql).await {
            return false;
        }
        if self.conn.exec_statement("SET FOREIGN_KEY_CHECKS=0", &self.cancel).await.is_err() {
            return false;
        }
        for stmt in inserts {
            if self.conn.exec_statement(stmt, &self.cancel).await.is_err() {
                let _ = self.conn.exec_statement("SET FOREIGN_KEY_CHECKS=1", &self.cancel).await;
                return false;
            }
        }
        let _ = self.conn.exec_statement("SET FOREIGN_KEY_CHECKS=1", &self.cancel).await;
        self.check(case_statements).await
    }
}
