//! GroundTruth: cross-checks the SUT's result against an independently
//! computed reference. Building the reference DSG (data-structure graph)
//! executor is an external collaborator per the design — this crate depends
//! only on the small [`GroundTruthSource`] contract, mirroring how
//! [`crate::generator::Generator`] keeps the SQL grammar out of tree.

use async_trait::async_trait;

use shiro_types::{compute_signature, GroundTruthCheck, OracleResult};

use crate::context::OracleContext;
use crate::oracle::Oracle;

/// A reference implementation capable of answering the same query as the
/// system under test, independent of its query engine. The production
/// deployment plugs in a DSG (in-memory row-scan) evaluator behind this
/// trait; tests use a canned source.
#[async_trait]
pub trait GroundTruthSource: Send + Sync {
    async fn eval(&self, sql: &str) -> Option<Vec<Vec<shiro_types::Value>>>;
}

/// A ground-truth source that never has an answer. Lets `GroundTruthOracle`
/// degrade to a no-op when no DSG is wired in, rather than requiring every
/// caller to special-case "oracle disabled".
pub struct NoGroundTruth;

#[async_trait]
impl GroundTruthSource for NoGroundTruth {
    async fn eval(&self, _sql: &str) -> Option<Vec<Vec<shiro_types::Value>>> {
        None
    }
}

pub struct GroundTruthOracle {
    source: Box<dyn GroundTruthSource>,
    /// Confidence below which a mismatch is downgraded rather than captured
    /// (the DSG's own answer may itself be wrong on exotic features).
    pub min_confidence: f64,
}

impl GroundTruthOracle {
    pub fn new(source: Box<dyn GroundTruthSource>, min_confidence: f64) -> Self {
        Self {
            source,
            min_confidence,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Box::new(NoGroundTruth), 1.0)
    }
}

#[async_trait]
impl Oracle for GroundTruthOracle {
    fn name(&self) -> &'static str {
        "GroundTruth"
    }

    async fn run(&self, ctx: &mut OracleContext<'_>) -> OracleResult {
        let Some(query) = ctx.generator.gen_base_query(ctx.schema, &ctx.bias) else {
            return OracleResult::error(self.name(), vec![], "generator produced no query");
        };
        let statements = vec![query.sql.clone()];

        let Some(reference_rows) = self.source.eval(&query.sql).await else {
            let mut result = OracleResult::pass(self.name(), statements, "disabled");
            result.ground_truth = Some(GroundTruthCheck {
                enabled: false,
                mismatch: false,
                row_count: 0,
                join_signature: 0,
            });
            return result;
        };

        let sut_rows = match ctx.conn.exec_query(&query.sql, ctx.cancel).await {
            Ok(rows) => rows,
            Err(err) => return OracleResult::error(self.name(), statements, err.to_string()),
        };

        let sig_sut = compute_signature(&sut_rows, ctx.round_scale);
        let sig_reference = compute_signature(&reference_rows, ctx.round_scale);
        let mismatch = sig_sut != sig_reference;

        // Below `min_confidence` a mismatch is reported but not treated as
        // a failing run — the orchestrator's post-processing downgrade
        // (low-confidence ground-truth) turns this into a skip rather than
        // a capture.
        let confident = self.min_confidence >= 1.0;
        let ok = !mismatch || !confident;

        let mut result = if ok {
            OracleResult::pass(self.name(), statements, format!("{sig_sut:?}"))
        } else {
            OracleResult::mismatch(self.name(), statements, format!("{sig_reference:?}"), format!("{sig_sut:?}"))
        };
        result.ground_truth = Some(GroundTruthCheck {
            enabled: true,
            mismatch,
            row_count: sut_rows.len() as u64,
            join_signature: 0,
        });
        result
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

    struct FixedSource(Vec<Vec<Value>>);

    #[async_trait]
    impl GroundTruthSource for FixedSource {
        async fn eval(&self, _sql: &str) -> Option<Vec<Vec<Value>>> {
            Some(self.0.clone())
        }
    }

    #[tokio::test]
    async fn disabled_source_passes_without_checking() {
        let schema = schema();
        let mut gen = SimpleGenerator::new(3);
        let stub = StubExecutor::new();
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
        let result = GroundTruthOracle::disabled().run(&mut ctx).await;
        assert!(result.ok);
        assert_eq!(result.ground_truth.as_ref().unwrap().enabled, false);
    }

    #[tokio::test]
    async fn confident_mismatch_against_reference_captures() {
        let schema = schema();
        let mut gen = SimpleGenerator::new(3);
        let stub = StubExecutor::new();
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
        let oracle = GroundTruthOracle::new(Box::new(FixedSource(vec![vec![Value::Int(1)], vec![Value::Int(2)]])), 1.0);
        let result = oracle.run(&mut ctx).await;
        assert!(!result.ok);
        assert!(result.ground_truth.as_ref().unwrap().mismatch);
    }
}
