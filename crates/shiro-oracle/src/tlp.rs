//! TLP (Ternary Logic Partitioning): a predicate `P` splits every row into
//! exactly one of `{P, NOT P, P IS NULL}`; the three partitions must sum to
//! the unpartitioned row count.

use async_trait::async_trait;

use shiro_types::OracleResult;

use crate::context::OracleContext;
use crate::oracle::Oracle;

pub struct TlpOracle;

impl TlpOracle {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TlpOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Oracle for TlpOracle {
    fn name(&self) -> &'static str {
        "TLP"
    }

    async fn run(&self, ctx: &mut OracleContext<'_>) -> OracleResult {
        let Some(query) = ctx.generator.gen_base_query(ctx.schema, &ctx.bias) else {
            return OracleResult::error(self.name(), vec![], "generator produced no query");
        };

        let total_sql = format!("SELECT * FROM `{}`", query.table);
        let true_sql = format!("SELECT * FROM `{}` WHERE {}", query.table, query.predicate);
        let false_sql = format!(
            "SELECT * FROM `{}` WHERE NOT ({})",
            query.table, query.predicate
        );
        let null_sql = format!(
            "SELECT * FROM `{}` WHERE ({}) IS NULL",
            query.table, query.predicate
        );
        let statements = vec![total_sql.clone(), true_sql.clone(), false_sql.clone(), null_sql.clone()];

        let total = match ctx.conn.exec_query(&total_sql, ctx.cancel).await {
            Ok(rows) => rows.len(),
            Err(err) => return OracleResult::error(self.name(), statements, err.to_string()),
        };
        let true_count = match ctx.conn.exec_query(&true_sql, ctx.cancel).await {
            Ok(rows) => rows.len(),
            Err(err) => return OracleResult::error(self.name(), statements, err.to_string()),
        };
        let false_count = match ctx.conn.exec_query(&false_sql, ctx.cancel).await {
            Ok(rows) => rows.len(),
            Err(err) => return OracleResult::error(self.name(), statements, err.to_string()),
        };
        let null_count = match ctx.conn.exec_query(&null_sql, ctx.cancel).await {
            Ok(rows) => rows.len(),
            Err(err) => return OracleResult::error(self.name(), statements, err.to_string()),
        };

        let partition_sum = true_count + false_count + null_count;
        if partition_sum == total {
            OracleResult::pass(self.name(), statements, total.to_string())
        } else {
            OracleResult::mismatch(self.name(), statements, total.to_string(), partition_sum.to_string())
                .with_metric("true_count", true_count as i64)
                .with_metric("false_count", false_count as i64)
                .with_metric("null_count", null_count as i64)
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
            nullable: true,
        });
        s.add_table(t).unwrap();
        s
    }

    #[tokio::test]
    async fn partitions_summing_to_total_pass() {
        let schema = schema();
        let mut gen = SimpleGenerator::new(3);
        let stub = StubExecutor::new();
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]; 10])));
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]; 6])));
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]; 3])));
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]; 1])));
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
        let result = TlpOracle::new().run(&mut ctx).await;
        assert!(result.ok);
    }

    #[tokio::test]
    async fn partitions_not_summing_to_total_capture() {
        let schema = schema();
        let mut gen = SimpleGenerator::new(3);
        let stub = StubExecutor::new();
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]; 10])));
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]; 6])));
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]; 3])));
        stub.push(StubResponse::Query(Ok(vec![])));
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
        let result = TlpOracle::new().run(&mut ctx).await;
        assert!(!result.ok);
    }
}
