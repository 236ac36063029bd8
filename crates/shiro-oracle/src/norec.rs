//! NoREC: compares a query's optimized row count against a rewritten,
//! hard-to-optimize scalar form of the same predicate (a `CASE WHEN`
//! summation the planner has no index strategy for).

use async_trait::async_trait;

use shiro_types::{OracleResult, Value};

use crate::context::OracleContext;
use crate::oracle::Oracle;

pub struct NoRecOracle;

impl NoRecOracle {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoRecOracle {
    fn default() -> Self {
        Self::new()
    }
}

fn as_i64(value: Option<Value>) -> i64 {
    match value {
        Some(Value::Int(i)) => i,
        Some(Value::UInt(u)) => u as i64,
        Some(Value::Double(d)) => d as i64,
        Some(Value::Null) | None => 0,
        _ => 0,
    }
}

#[async_trait]
impl Oracle for NoRecOracle {
    fn name(&self) -> &'static str {
        "NoREC"
    }

    async fn run(&self, ctx: &mut OracleContext<'_>) -> OracleResult {
        let Some(query) = ctx.generator.gen_base_query(ctx.schema, &ctx.bias) else {
            return OracleResult::error(self.name(), vec![], "generator produced no query");
        };

        let optimized_sql = query.sql.clone();
        let unoptimized_sql = format!(
            "SELECT SUM(CASE WHEN {} THEN 1 ELSE 0 END) FROM `{}`",
            query.predicate, query.table
        );
        let statements = vec![optimized_sql.clone(), unoptimized_sql.clone()];

        let optimized_rows = match ctx.conn.exec_query(&optimized_sql, ctx.cancel).await {
            Ok(rows) => rows,
            Err(err) => return OracleResult::error(self.name(), statements, err.to_string()),
        };
        let unoptimized_count = match ctx.conn.exec_scalar(&unoptimized_sql, ctx.cancel).await {
            Ok(value) => as_i64(value),
            Err(err) => return OracleResult::error(self.name(), statements, err.to_string()),
        };

        let optimized_count = optimized_rows.len() as i64;
        if optimized_count == unoptimized_count {
            OracleResult::pass(self.name(), statements, optimized_count.to_string())
        } else {
            OracleResult::mismatch(
                self.name(),
                statements,
                unoptimized_count.to_string(),
                optimized_count.to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiro_executor::stub::{StubExecutor, StubResponse};
    use shiro_executor::Executor;
    use crate::generator::{FeatureBias, SimpleGenerator};
    use shiro_types::{Column, ColumnType, Table};
    use tokio_util::sync::CancellationToken;

    fn schema_with_rows() -> shiro_types::SchemaState {
        let mut s = shiro_types::SchemaState::new("db");
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
    async fn matching_counts_pass() {
        let schema = schema_with_rows();
        let mut gen = SimpleGenerator::new(7);
        let stub = StubExecutor::new();
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)], vec![Value::Int(2)]])));
        stub.push(StubResponse::Scalar(Ok(Some(Value::Int(2)))));
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
        let result = NoRecOracle::new().run(&mut ctx).await;
        assert!(result.ok);
    }

    #[tokio::test]
    async fn mismatched_counts_capture() {
        let schema = schema_with_rows();
        let mut gen = SimpleGenerator::new(7);
        let stub = StubExecutor::new();
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]])));
        stub.push(StubResponse::Scalar(Ok(Some(Value::Int(5)))));
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
        let result = NoRecOracle::new().run(&mut ctx).await;
        assert!(!result.ok);
        assert!(result.check_invariant());
    }
}
