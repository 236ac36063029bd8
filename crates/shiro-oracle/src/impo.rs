//! Impo: implication testing. Strengthening a predicate (`P AND extra`)
//! can only shrink the row set; every row the stronger query returns must
//! already appear in the weaker query's rows (`impo_is_upper`). A row in
//! the stronger result absent from the weaker one is a containment
//! violation.

use async_trait::async_trait;
use std::collections::HashSet;

use shiro_executor::Row;
use shiro_types::{ColumnCategory, Detail, OracleResult, SchemaState};

use crate::context::OracleContext;
use crate::generator::GeneratedQuery;
use crate::oracle::Oracle;

pub struct ImpoOracle {
    pub max_rows: u64,
}

impl ImpoOracle {
    pub fn new(max_rows: u64) -> Self {
        Self { max_rows }
    }
}

impl Default for ImpoOracle {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Builds the conjunct that actually strengthens `query.predicate`: a
/// type-appropriate comparison on another of the table's columns (falling
/// back to the same column if it only has one), so `stronger_sql`'s row
/// set is a genuine subset of `weaker_sql`'s rather than an identical
/// predicate dressed up with a tautology.
fn narrowing_conjunct(schema: &SchemaState, query: &GeneratedQuery) -> Option<String> {
    let table_idx = schema.find_table(&query.table)?;
    let table = schema.table(table_idx)?;
    let used_col = query.predicate.split_whitespace().next().unwrap_or("");
    let candidate = table
        .columns
        .iter()
        .find(|c| c.name != used_col)
        .or_else(|| table.columns.first())?;

    Some(match candidate.ty.category() {
        ColumnCategory::Numeric => format!("{} >= 0", candidate.name),
        ColumnCategory::Boolean | ColumnCategory::StringLike | ColumnCategory::Temporal => {
            format!("{} IS NOT NULL", candidate.name)
        }
    })
}

fn fingerprints(rows: &[Row]) -> HashSet<Vec<u8>> {
    rows.iter()
        .map(|row| row.iter().flat_map(shiro_types::Value::fingerprint_bytes).collect())
        .collect()
}

#[async_trait]
impl Oracle for ImpoOracle {
    fn name(&self) -> &'static str {
        "Impo"
    }

    async fn run(&self, ctx: &mut OracleContext<'_>) -> OracleResult {
        let Some(query) = ctx.generator.gen_base_query(ctx.schema, &ctx.bias) else {
            return OracleResult::error(self.name(), vec![], "generator produced no query")
                .with_metric("impo_total", 0)
                .with_metric("impo_skip", 1)
                .with_metric("impo_trunc", 0);
        };

        let weaker_sql = query.sql.clone();
        let conjunct = narrowing_conjunct(ctx.schema, &query).unwrap_or_else(|| "1=1".to_string());
        let stronger_sql =
            format!("SELECT * FROM `{}` WHERE ({}) AND {}", query.table, query.predicate, conjunct);
        let statements = vec![weaker_sql.clone(), stronger_sql.clone()];

        let weaker_rows = match ctx.conn.exec_query(&weaker_sql, ctx.cancel).await {
            Ok(rows) => rows,
            Err(err) => {
                return OracleResult::error(self.name(), statements, err.to_string())
                    .with_metric("impo_total", 1)
                    .with_metric("impo_skip", 1)
                    .with_metric("impo_trunc", 0)
            }
        };
        let stronger_rows = match ctx.conn.exec_query(&stronger_sql, ctx.cancel).await {
            Ok(rows) => rows,
            Err(err) => {
                return OracleResult::error(self.name(), statements, err.to_string())
                    .with_metric("impo_total", 1)
                    .with_metric("impo_skip", 1)
                    .with_metric("impo_trunc", 0)
            }
        };

        let truncated = i64::from(
            weaker_rows.len() as u64 > self.max_rows || stronger_rows.len() as u64 > self.max_rows,
        );
        let weaker_capped: Vec<_> = weaker_rows.into_iter().take(self.max_rows as usize).collect();
        let stronger_capped: Vec<_> = stronger_rows.into_iter().take(self.max_rows as usize).collect();

        let weaker_set = fingerprints(&weaker_capped);
        let contained = stronger_capped
            .iter()
            .all(|row| weaker_set.contains(&row.iter().flat_map(shiro_types::Value::fingerprint_bytes).collect::<Vec<u8>>()));

        let result = if contained {
            OracleResult::pass(self.name(), statements, "contained")
        } else {
            tracing::debug!(table = %query.table, "impo containment violation");
            OracleResult::mismatch(self.name(), statements, "contained", "not_contained")
                .with_detail(Detail::ReplayImpoIsUpper(true))
        };

        result
            .with_metric("impo_total", 1)
            .with_metric("impo_skip", 0)
            .with_metric("impo_trunc", truncated)
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
    async fn strictly_contained_rows_pass() {
        let schema = schema();
        let mut gen = SimpleGenerator::new(5);
        let stub = StubExecutor::new();
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)], vec![Value::Int(2)]])));
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
        let result = ImpoOracle::default().run(&mut ctx).await;
        assert!(result.ok);
        assert_eq!(result.metrics.get("impo_total"), Some(&1));
    }

    #[tokio::test]
    async fn a_stronger_row_missing_from_weaker_captures() {
        let schema = schema();
        let mut gen = SimpleGenerator::new(5);
        let stub = StubExecutor::new();
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(1)]])));
        stub.push(StubResponse::Query(Ok(vec![vec![Value::Int(99)]])));
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
        let result = ImpoOracle::default().run(&mut ctx).await;
        assert!(!result.ok);
        assert!(result.details.iter().any(|d| matches!(d, Detail::ReplayImpoIsUpper(true))));
    }
}
