//! The parameterized-query contract the plan-cache protocol depends on.
//! Kept separate from `shiro_oracle::Generator` since it must hand back
//! two argument vectors over the same `?`-templated SQL rather than one
//! fully-materialized query (§4.5 step 1).

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use shiro_types::{ColumnCategory, SchemaState};

/// A `?`-parameterized query plus two argument vectors drawn from
/// compatible domains (`A1`, `A2` in §4.5).
#[derive(Debug, Clone)]
pub struct ParamQuery {
    pub template: String,
    pub table: String,
    pub args1: Vec<shiro_types::Value>,
    pub args2: Vec<shiro_types::Value>,
}

pub trait ParamGenerator: Send {
    fn gen_parameterized(&mut self, schema: &SchemaState) -> Option<ParamQuery>;
}

/// A minimal parameterized-query generator: a single-placeholder
/// comparison predicate over a random base table's numeric (or boolean)
/// column. Sufficient to drive the plan-cache protocol end to end; a
/// production deployment would plug the real grammar in behind the same
/// trait, exactly like `shiro_oracle::SimpleGenerator`.
pub struct SimpleParamGenerator {
    rng: SmallRng,
}

impl SimpleParamGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl ParamGenerator for SimpleParamGenerator {
    fn gen_parameterized(&mut self, schema: &SchemaState) -> Option<ParamQuery> {
        let base_indices: Vec<usize> = schema.base_table_indices().collect();
        let table_idx = *base_indices.choose(&mut self.rng)?;
        let table = schema.table(table_idx)?;
        let column = table
            .columns
            .iter()
            .find(|c| matches!(c.ty.category(), ColumnCategory::Numeric))
            .or_else(|| table.columns.first())?;

        let template = format!("SELECT * FROM `{}` WHERE `{}` > ?", table.name, column.name);
        let a1 = self.rng.gen_range(0..1000);
        // ~30% of the time reuse A1 for A2 to exercise the "A2 == A1"
        // branch of the protocol (no second concrete-SQL signature needed).
        let a2 = if self.rng.gen_bool(0.3) { a1 } else { self.rng.gen_range(0..1000) };

        Some(ParamQuery {
            template,
            table: table.name.clone(),
            args1: vec![shiro_types::Value::Int(a1)],
            args2: vec![shiro_types::Value::Int(a2)],
        })
    }
}
