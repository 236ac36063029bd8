//! CERT: cardinality-estimation regression testing. Compares the
//! planner's estimated row count (parsed from `EXPLAIN`) against the
//! actual row count of the same query; a gross overestimate beyond
//! `tolerance` is a capture. Kept deterministic at a tiny sampling rate by
//! the oracle bandit (§4.4) rather than disabled outright, so a skip below
//! `min_base_rows` still counts as "ran".

use async_trait::async_trait;

use shiro_types::OracleResult;

use crate::context::OracleContext;
use crate::oracle::Oracle;

pub struct CertOracle {
    pub min_base_rows: u64,
    pub tolerance: f64,
}

impl CertOracle {
    pub fn new(min_base_rows: u64, tolerance: f64) -> Self {
        Self {
            min_base_rows,
            tolerance,
        }
    }
}

impl Default for CertOracle {
    fn default() -> Self {
        Self::new(10, 2.0)
    }
}

/// Parses the first `estRows` figure out of a textual EXPLAIN plan. Real
/// plans are tabular; this accepts the simplified `estRows=<n>` token the
/// stub executor and tests use, and is replaced by a structured EXPLAIN
/// parser in `shiro-coverage` for the full plan-shape digest.
fn parse_est_rows(explain_text: &str) -> Option<f64> {
    explain_text
        .split_whitespace()
        .find_map(|tok| tok.strip_prefix("estRows=")?.parse::<f64>().ok())
}

#[async_trait]
impl Oracle for CertOracle {
    fn name(&self) -> &'static str {
        "CERT"
    }

    async fn run(&self, ctx: &mut OracleContext<'_>) -> OracleResult {
        let Some(query) = ctx.generator.gen_base_query(ctx.schema, &ctx.bias) else {
            return OracleResult::error(self.name(), vec![], "generator produced no query");
        };

        let explain_sql = format!("EXPLAIN {}", query.sql);
        let statements = vec![explain_sql.clone(), query.sql.clone()];

        let explain_rows = match ctx.conn.exec_query(&explain_sql, ctx.cancel).await {
            Ok(rows) => rows,
            Err(err) => return OracleResult::error(self.name(), statements, err.to_string()),
        };
        let explain_text = explain_rows
            .iter()
            .flat_map(|row| row.iter().map(ToString::to_string))
            .collect::<Vec<_>>()
            .join(" ");
        let Some(est_rows) = parse_est_rows(&explain_text) else {
            return OracleResult::pass(self.name(), statements, "no estimate")
                .with_detail(shiro_types::Detail::SkipReason("no_est_rows_in_plan".to_string()));
        };

        let actual_rows = match ctx.conn.exec_query(&query.sql, ctx.cancel).await {
            Ok(rows) => rows.len() as u64,
            Err(err) => return OracleResult::error(self.name(), statements, err.to_string()),
        };

        if actual_rows < self.min_base_rows {
            return OracleResult::pass(self.name(), statements, "below_min_base_rows")
                .with_detail(shiro_types::Detail::SkipReason("below_min_base_rows".to_string()));
        }

        if est_rows > actual_rows as f64 * (1.0 + self.tolerance) {
            OracleResult::mismatch(
                self.name(),
                statements,
                actual_rows.to_string(),
                est_rows.to_string(),
            )
        } else {
            OracleResult::pass(self.name(), statements, actual_rows.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{FeatureBias, SimpleGenerator};
    use shiro_executor::stub::{StubExecutor, StubResponse};
    use shiro_executor::Executor;
    use shiro_types::{Column, ColumnType, SchemaState, Table, Value};
    use tokio_util::sync::CancellationToken;

    fn schema() -> SchemaState {
        let mut s = SchemaState::new("db");
        let mut t = Table::new_base("t0");
        t.columns.push(Column {
            name: "c0".to_string(),
            ty: ColumnType::Int,
            nullable: false,
        });
        s.add_table(t).unwrap();
        s
    }

    #[tokio::test]
    async fn gross_overestimate_captures() {
        let schema = schema();
        let mut gen = SimpleGenerator::new(4);
        let stub = StubExecutor::new();
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Text(
            "estRows=1000".to_string(),
        )]])));
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]; 20])));
        let cancel = CancellationToken::new();
        let mut conn = stub.acquire(&cancel).await.unwrap();
        let mut ctx = OracleContext {
            conn: conn.as_mut(),
            generator: &mut gen,
            schema: &schema,
            bias: FeatureBias::default(),
            cancel: &cancel,
            round_scale: 2,
        };
        let result = CertOracle::new(10, 2.0).run(&mut ctx).await;
        assert!(!result.ok);
    }

    #[tokio::test]
    async fn low_row_count_skips_below_threshold() {
        let schema = schema();
        let mut gen = SimpleGenerator::new(4);
        let stub = StubExecutor::new();
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Text(
            "estRows=1000".to_string(),
        )]])));
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]; 2])));
        let cancel = CancellationToken::new();
        let mut conn = stub.acquire(&cancel).await.unwrap();
        let mut ctx = OracleContext {
            conn: conn.as_mut(),
            generator: &mut gen,
            schema: &schema,
            bias: FeatureBias::default(),
            cancel: &cancel,
            round_scale: 2,
        };
        let result = CertOracle::new(10, 2.0).run(&mut ctx).await;
        assert!(result.ok);
    }
}
