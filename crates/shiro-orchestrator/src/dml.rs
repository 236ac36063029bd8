//! DML action generation and execution: `INSERT`, `UPDATE`, `DELETE`
//! against a randomly chosen base table (§4.3).
//!
//! Only `INSERT` touches schema-tracked state (`Table::record_inserts`),
//! so it is the only one of the three that re-acquires `gen_mu` after the
//! statement has executed; `UPDATE`/`DELETE` read a table snapshot under
//! the lock, release it, and run with no lock held.

use rand::seq::SliceRandom;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use shiro_bandit::Dml;
use shiro_executor::{Connection, ExecutorError};
use shiro_plancache::sql_literal;
use shiro_types::Table;

use crate::state::Shared;
use crate::values::random_value;

const MAX_BATCH_ROWS: u64 = 20;

/// Snapshot of the target table taken while `gen_mu` is held, just enough
/// to build SQL without holding the lock across the network round trip.
struct TargetTable {
    idx: usize,
    table: Table,
}

fn pick_target(shared: &Shared, rng: &mut impl Rng) -> Option<TargetTable> {
    let gen = shared.lock_gen();
    let candidates: Vec<usize> = gen.schema.base_table_indices().collect();
    let idx = *candidates.choose(rng)?;
    let table = gen.schema.table(idx)?.clone();
    Some(TargetTable { idx, table })
}

fn quote_ident(name: &str) -> String {
    format!("`{name}`")
}

/// Executes the DML statement chosen by the `Dml` bandit arm against a
/// random base table. Returns the statement text actually sent so the
/// caller can feed it into the insert ring / coverage bookkeeping.
pub async fn execute_dml(
    shared: &Shared,
    conn: &mut dyn Connection,
    rng: &mut impl Rng,
    action: Dml,
    cancel: &CancellationToken,
) -> Option<Result<String, ExecutorError>> {
    let target = pick_target(shared, rng)?;
    match action {
        Dml::Insert => Some(execute_insert(shared, conn, rng, target, cancel).await),
        Dml::Update => Some(execute_update(conn, rng, &target.table, cancel).await),
        Dml::Delete => Some(execute_delete(conn, rng, &target.table, cancel).await),
    }
}

async fn execute_insert(
    shared: &Shared,
    conn: &mut dyn Connection,
    rng: &mut impl Rng,
    target: TargetTable,
    cancel: &CancellationToken,
) -> Result<String, ExecutorError> {
    let row_count = rng.gen_range(1..=MAX_BATCH_ROWS);
    let columns: Vec<&str> = target.table.columns.iter().skip(1).map(|c| c.name.as_str()).collect();

    let mut value_tuples = Vec::with_capacity(row_count as usize);
    for _ in 0..row_count {
        let literals: Vec<String> = target
            .table
            .columns
            .iter()
            .skip(1)
            .map(|c| sql_literal(&random_value(rng, &c.ty, c.nullable)))
            .collect();
        value_tuples.push(format!("({})", literals.join(", ")));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(&target.table.name),
        columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
        value_tuples.join(", "),
    );

    let affected = conn.exec_statement(&sql, cancel).await?;

    let mut gen = shared.lock_gen();
    if let Some(table) = gen.schema.table_mut(target.idx) {
        table.record_inserts(affected.max(row_count));
    }
    gen.insert_ring.push(sql.clone());

    Ok(sql)
}

async fn execute_update(
    conn: &mut dyn Connection,
    rng: &mut impl Rng,
    table: &Table,
    cancel: &CancellationToken,
) -> Result<String, ExecutorError> {
    let data_columns: Vec<_> = table.columns.iter().skip(1).collect();
    let Some(set_col) = data_columns.choose(rng) else {
        return Ok(String::new());
    };
    let set_value = sql_literal(&random_value(rng, &set_col.ty, set_col.nullable));

    let predicate = match data_columns.choose(rng) {
        Some(pred_col) => {
            let bound = sql_literal(&random_value(rng, &pred_col.ty, false));
            format!("{} <> {bound}", quote_ident(&pred_col.name))
        }
        None => "1 = 1".to_string(),
    };

    let sql = format!(
        "UPDATE {} SET {} = {set_value} WHERE {predicate} LIMIT {MAX_BATCH_ROWS}",
        quote_ident(&table.name),
        quote_ident(&set_col.name),
    );
    conn.exec_statement(&sql, cancel).await?;
    Ok(sql)
}

async fn execute_delete(
    conn: &mut dyn Connection,
    rng: &mut impl Rng,
    table: &Table,
    cancel: &CancellationToken,
) -> Result<String, ExecutorError> {
    let data_columns: Vec<_> = table.columns.iter().skip(1).collect();
    let predicate = match data_columns.choose(rng) {
        Some(pred_col) => {
            let bound = sql_literal(&random_value(rng, &pred_col.ty, false));
            format!("{} <> {bound}", quote_ident(&pred_col.name))
        }
        None => "1 = 1".to_string(),
    };

    let sql = format!(
        "DELETE FROM {} WHERE {predicate} LIMIT {MAX_BATCH_ROWS}",
        quote_ident(&table.name),
    );
    conn.exec_statement(&sql, cancel).await?;
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use shiro_config::ShiroConfig;
    use shiro_types::{Column, ColumnType, SchemaState};

    fn table_with_one_column() -> Table {
        let mut t = Table::new_base("t");
        t.columns.push(Column { name: "id".to_string(), ty: ColumnType::BigInt, nullable: false });
        t.columns.push(Column { name: "n".to_string(), ty: ColumnType::Int, nullable: true });
        t
    }

    #[test]
    fn pick_target_returns_none_on_empty_schema() {
        let shared = Shared::new(ShiroConfig::default(), SchemaState::new("db"));
        let mut rng = SmallRng::seed_from_u64(1);
        assert!(pick_target(&shared, &mut rng).is_none());
    }

    #[test]
    fn pick_target_finds_the_only_base_table() {
        let mut schema = SchemaState::new("db");
        schema.add_table(table_with_one_column()).unwrap();
        let shared = Shared::new(ShiroConfig::default(), schema);
        let mut rng = SmallRng::seed_from_u64(1);
        let target = pick_target(&shared, &mut rng).unwrap();
        assert_eq!(target.table.name, "t");
    }
}
