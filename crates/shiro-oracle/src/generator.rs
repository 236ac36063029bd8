//! The generator contract oracles depend on.
//!
//! The SQL generator's grammar itself is out of scope for this crate (see
//! spec §1): oracles never build SQL by hand past the small set of
//! reformulations their rule defines, and instead ask a [`Generator`] for a
//! base query shaped by a [`FeatureBias`]. [`SimpleGenerator`] is a minimal
//! in-tree implementation sufficient to exercise the oracle set end to end;
//! a production deployment would plug in the real grammar behind the same
//! trait.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use shiro_types::SchemaState;

/// The generation knobs the orchestrator's coverage controller and
/// oracle-specific bias override before asking for a query (see §4.3/§4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBias {
    pub join_count: u32,
    pub subquery_count: u32,
    pub aggregate_prob: f64,
    pub cte_enabled: bool,
    pub views_enabled: bool,
    pub order_by_enabled: bool,
    pub limit_enabled: bool,
    pub window_functions_enabled: bool,
    pub correlated_subqueries_enabled: bool,
}

/// A base query plus enough structure for an oracle to build its
/// reformulations without re-parsing the SQL text.
#[derive(Debug, Clone)]
pub struct GeneratedQuery {
    pub sql: String,
    pub table: String,
    pub predicate: String,
    pub columns: Vec<String>,
}

/// The contract oracles depend on: produce one base query against `schema`
/// honoring `bias` as closely as the implementation can.
pub trait Generator: Send {
    fn gen_base_query(&mut self, schema: &SchemaState, bias: &FeatureBias) -> Option<GeneratedQuery>;
}

/// A minimal generator: picks a random base table, a random subset of its
/// columns, and a random comparison predicate over one numeric/string
/// column. Enough to drive every oracle's protocol; not a stand-in for the
/// real grammar.
pub struct SimpleGenerator {
    rng: SmallRng,
}

impl SimpleGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Generator for SimpleGenerator {
    fn gen_base_query(&mut self, schema: &SchemaState, bias: &FeatureBias) -> Option<GeneratedQuery> {
        let base_indices: Vec<usize> = schema.base_table_indices().collect();
        let table_idx = *base_indices.choose(&mut self.rng)?;
        let table = schema.table(table_idx)?;
        if table.columns.is_empty() {
            return None;
        }
        let columns: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
        let predicate_col = table.columns.choose(&mut self.rng)?;
        let predicate = match predicate_col.ty.category() {
            shiro_types::ColumnCategory::Numeric => {
                let bound: i64 = self.rng.gen_range(0..1000);
                format!("{} > {bound}", predicate_col.name)
            }
            shiro_types::ColumnCategory::Boolean => format!("{} IS TRUE", predicate_col.name),
            _ => format!("{} IS NOT NULL", predicate_col.name),
        };
        let _ = bias; // bias shapes join/subquery count in a full grammar; SimpleGenerator ignores it.
        Some(GeneratedQuery {
            sql: format!(
                "SELECT * FROM `{}` WHERE {predicate}",
                table.name
            ),
            table: table.name.clone(),
            predicate,
            columns,
        })
    }
}
