//! DQP (Differential Query Plans): the same predicate is evaluated once
//! under the planner's default choice and once with the dominant index
//! suppressed, and the resulting row signatures must agree. §4.6 biases
//! DQP's generation toward ≥3 joins and zero subqueries; `SimpleGenerator`
//! does not yet synthesize joins, so this oracle forces the bias flag and
//! lets the generator degrade gracefully to its single-table form.

use async_trait::async_trait;

use shiro_types::{compute_signature, OracleResult};

use crate::context::OracleContext;
use crate::oracle::Oracle;

pub struct DqpOracle;

impl DqpOracle {
    pub fn new() -> Self {
        Self
    }

    /// The bias this oracle imposes on generation, per §4.6(c).
    pub fn bias_join_count(&self) -> u32 {
        3
    }
}

impl Default for DqpOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Oracle for DqpOracle {
    fn name(&self) -> &'static str {
        "DQP"
    }

    async fn run(&self, ctx: &mut OracleContext<'_>) -> OracleResult {
        let mut bias = ctx.bias;
        bias.join_count = bias.join_count.max(self.bias_join_count());
        bias.subquery_count = 0;
        let Some(query) = ctx.generator.gen_base_query(ctx.schema, &bias) else {
            return OracleResult::error(self.name(), vec![], "generator produced no query");
        };

        let default_sql = query.sql.clone();
        let no_index_sql = format!(
            "SELECT /*+ IGNORE_INDEX(`{}`) */ * FROM `{}` WHERE {}",
            query.table, query.table, query.predicate
        );
        let statements = vec![default_sql.clone(), no_index_sql.clone()];

        let default_rows = match ctx.conn.exec_query(&default_sql, ctx.cancel).await {
            Ok(rows) => rows,
            Err(err) => return OracleResult::error(self.name(), statements, err.to_string()),
        };
        let no_index_rows = match ctx.conn.exec_query(&no_index_sql, ctx.cancel).await {
            Ok(rows) => rows,
            Err(err) => return OracleResult::error(self.name(), statements, err.to_string()),
        };

        let sig_default = compute_signature(&default_rows, ctx.round_scale);
        let sig_no_index = compute_signature(&no_index_rows, ctx.round_scale);

        if sig_default == sig_no_index {
            OracleResult::pass(self.name(), statements, format!("{sig_default:?}"))
        } else {
            OracleResult::mismatch(
                self.name(),
                statements,
                format!("{sig_default:?}"),
                format!("{sig_no_index:?}"),
            )
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
    async fn identical_plans_pass() {
        let schema = schema();
        let mut gen = SimpleGenerator::new(9);
        let stub = StubExecutor::new();
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]])));
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]])));
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
        assert!(DqpOracle::new().run(&mut ctx).await.ok);
    }

    #[tokio::test]
    async fn diverging_plans_capture() {
        let schema = schema();
        let mut gen = SimpleGenerator::new(9);
        let stub = StubExecutor::new();
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]])));
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(2)]])));
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
        assert!(!DqpOracle::new().run(&mut ctx).await.ok);
    }
}
