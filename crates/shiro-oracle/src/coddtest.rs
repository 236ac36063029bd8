//! CODDTest: a predicate and its double-negation (`NOT NOT (p)`) must
//! select the same rows under three-valued logic — unlike TLP's
//! partitioning, this single rewrite targets constant-folding bugs in the
//! optimizer specifically, where a folding pass can drop or mishandle the
//! redundant negation.

use async_trait::async_trait;

use shiro_types::{compute_signature, OracleResult};

use crate::context::OracleContext;
use crate::oracle::Oracle;

pub struct CoddTestOracle;

impl CoddTestOracle {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CoddTestOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Oracle for CoddTestOracle {
    fn name(&self) -> &'static str {
        "CODDTest"
    }

    async fn run(&self, ctx: &mut OracleContext<'_>) -> OracleResult {
        let Some(query) = ctx.generator.gen_base_query(ctx.schema, &ctx.bias) else {
            return OracleResult::error(self.name(), vec![], "generator produced no query");
        };

        let original_sql = query.sql.clone();
        let folded_sql = format!(
            "SELECT * FROM `{}` WHERE NOT NOT ({})",
            query.table, query.predicate
        );
        let statements = vec![original_sql.clone(), folded_sql.clone()];

        let original_rows = match ctx.conn.exec_query(&original_sql, ctx.cancel).await {
            Ok(rows) => rows,
            Err(err) => return OracleResult::error(self.name(), statements, err.to_string()),
        };
        let folded_rows = match ctx.conn.exec_query(&folded_sql, ctx.cancel).await {
            Ok(rows) => rows,
            Err(err) => return OracleResult::error(self.name(), statements, err.to_string()),
        };

        let sig_original = compute_signature(&original_rows, ctx.round_scale);
        let sig_folded = compute_signature(&folded_rows, ctx.round_scale);

        if sig_original == sig_folded {
            OracleResult::pass(self.name(), statements, format!("{sig_original:?}"))
        } else {
            OracleResult::mismatch(
                self.name(),
                statements,
                format!("{sig_original:?}"),
                format!("{sig_folded:?}"),
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
            nullable: true,
        });
        s.add_table(t).unwrap();
        s
    }

    #[tokio::test]
    async fn double_negation_matching_passes() {
        let schema = schema();
        let mut gen = SimpleGenerator::new(2);
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
        assert!(CoddTestOracle::new().run(&mut ctx).await.ok);
    }

    #[tokio::test]
    async fn double_negation_diverging_captures() {
        let schema = schema();
        let mut gen = SimpleGenerator::new(2);
        let stub = StubExecutor::new();
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]])));
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
        assert!(!CoddTestOracle::new().run(&mut ctx).await.ok);
    }
}
