//! DQE (Differential Query Execution): runs the same query once under the
//! default session and once with a session variable toggled (the
//! repro-side anchor is a `ReplaySetVar` detail, not a SQL rewrite), and
//! compares row signatures. Catches bugs that only a session-level switch
//! exposes, as opposed to NoREC's always-on scalar rewrite.

use async_trait::async_trait;

use shiro_types::{compute_signature, Detail, OracleResult};

use crate::context::OracleContext;
use crate::oracle::Oracle;

/// The session variable this oracle toggles. TiDB's index-merge switch is
/// a real example of a session knob whose two settings must agree on
/// results and only on results.
const SESSION_VAR: &str = "tidb_enable_index_merge";

pub struct DqeOracle;

impl DqeOracle {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DqeOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Oracle for DqeOracle {
    fn name(&self) -> &'static str {
        "DQE"
    }

    async fn run(&self, ctx: &mut OracleContext<'_>) -> OracleResult {
        let Some(query) = ctx.generator.gen_base_query(ctx.schema, &ctx.bias) else {
            return OracleResult::error(self.name(), vec![], "generator produced no query");
        };

        let set_off = format!("SET SESSION {SESSION_VAR} = OFF");
        let set_on = format!("SET SESSION {SESSION_VAR} = ON");
        let statements = vec![set_off.clone(), query.sql.clone(), set_on.clone(), query.sql.clone()];

        if let Err(err) = ctx.conn.exec_statement(&set_off, ctx.cancel).await {
            return OracleResult::error(self.name(), statements, err.to_string());
        }
        let off_rows = match ctx.conn.exec_query(&query.sql, ctx.cancel).await {
            Ok(rows) => rows,
            Err(err) => return OracleResult::error(self.name(), statements, err.to_string()),
        };
        if let Err(err) = ctx.conn.exec_statement(&set_on, ctx.cancel).await {
            return OracleResult::error(self.name(), statements, err.to_string());
        }
        let on_rows = match ctx.conn.exec_query(&query.sql, ctx.cancel).await {
            Ok(rows) => rows,
            Err(err) => return OracleResult::error(self.name(), statements, err.to_string()),
        };

        let sig_off = compute_signature(&off_rows, ctx.round_scale);
        let sig_on = compute_signature(&on_rows, ctx.round_scale);

        if sig_off == sig_on {
            OracleResult::pass(self.name(), statements, format!("{sig_off:?}"))
        } else {
            OracleResult::mismatch(self.name(), statements, format!("{sig_off:?}"), format!("{sig_on:?}"))
                .with_detail(Detail::ReplaySetVar {
                    name: SESSION_VAR.to_string(),
                    value: "ON".to_string(),
                })
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
    async fn same_results_across_session_vars_pass() {
        let schema = schema();
        let mut gen = SimpleGenerator::new(11);
        let stub = StubExecutor::new();
        stub.push(StubResponse::Statement(Ok(0)));
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]])));
        stub.push(StubResponse::Statement(Ok(0)));
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
        assert!(DqeOracle::new().run(&mut ctx).await.ok);
    }

    #[tokio::test]
    async fn differing_results_across_session_vars_capture() {
        let schema = schema();
        let mut gen = SimpleGenerator::new(11);
        let stub = StubExecutor::new();
        stub.push(StubResponse::Statement(Ok(0)));
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]])));
        stub.push(StubResponse::Statement(Ok(0)));
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
        let result = DqeOracle::new().run(&mut ctx).await;
        assert!(!result.ok);
        assert!(result.details.iter().any(|d| matches!(d, Detail::ReplaySetVar { .. })));
    }
}
