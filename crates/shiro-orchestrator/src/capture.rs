//! Case capture (§4.7): hands a mismatch/error off to [`Reporter`], then
//! appends the one artifact it doesn't know how to produce itself —
//! `data.tsv`, a per-table sample pulled live off the connection, since
//! `Reporter::report` only ever sees already-materialized strings
//! (`schema_sql`, the insert ring, the oracle's own statements).

use std::path::Path;

use tokio_util::sync::CancellationToken;

use shiro_executor::Connection;
use shiro_minimize::{minimize, MinimizeOutcome};
use shiro_oracle::OracleKind;
use shiro_report::{CaseReport, Reporter, SummaryContext};
use shiro_types::{OracleResult, SchemaState};

use crate::minimize_adapter::ReplayHarness;
use crate::query::{replay_spec_for, CERT_TOLERANCE};
use crate::state::Shared;

/// Allocates a case directory via `reporter`, appends `data.tsv` sampling
/// up to `storage.max_data_dump_rows` rows per base table, then (when
/// `minimize.enabled`) reduces the case and writes a `min/` subdirectory.
/// Sampling failures are folded into `data.tsv` rather than aborting the
/// capture — a mismatch is worth keeping even if one table's sample query
/// itself errors (e.g. against a table a racing DDL just dropped).
pub async fn capture(
    shared: &Shared,
    conn: &mut dyn Connection,
    kind: OracleKind,
    result: &OracleResult,
    base_database: &str,
    mut ctx: SummaryContext,
    cancel: &CancellationToken,
) -> Result<CaseReport, shiro_report::ReportError> {
    let (schema_sql, schema, insert_ring) = {
        let gen = shared.lock_gen();
        (gen.schema_sql(), gen.schema.clone(), gen.insert_ring.clone())
    };

    let (replay_kind, replay_spec) = replay_spec_for(kind, result, CERT_TOLERANCE);
    ctx.replay_spec = Some(replay_spec.clone());

    let reporter = Reporter::new(capture_root(shared));
    let report = reporter.report(&schema_sql, &insert_ring, result, ctx).await?;

    let dump = dump_tables(conn, &schema, shared.config.storage.max_data_dump_rows, cancel).await;
    let _ = std::fs::write(report.case_dir.join("data.tsv"), dump);

    shared.lock_stats().counters.captures += 1;

    if shared.config.minimize.enabled {
        run_minimize(
            shared,
            conn,
            kind,
            &schema_sql,
            insert_ring.snapshot(),
            result.statements.clone(),
            replay_spec,
            replay_kind,
            base_database,
            &report.case_dir,
            cancel,
        )
        .await;
    }

    Ok(report)
}

#[allow(clippy::too_many_arguments)]
async fn run_minimize(
    shared: &Shared,
    conn: &mut dyn Connection,
    kind: OracleKind,
    schema_sql: &str,
    inserts: Vec<String>,
    case_statements: Vec<String>,
    replay_spec: shiro_types::ReplaySpec,
    replay_kind: shiro_types::ReplayKind,
    base_database: &str,
    case_dir: &Path,
    cancel: &CancellationToken,
) {
    let min_database = format!("{base_database}_min");
    let mut harness = ReplayHarness::new(
        conn,
        schema_sql.to_string(),
        min_database,
        kind,
        shared.config.signature.round_scale as u32,
        CERT_TOLERANCE,
        cancel.clone(),
    );

    let outcome = minimize(
        &shared.config.minimize,
        schema_sql,
        inserts,
        case_statements,
        Some(replay_spec),
        replay_kind,
        &mut harness,
        cancel,
    )
    .await;

    match outcome {
        MinimizeOutcome::Reduced { inserts, case_statements, repro_sql, flaky, rounds } => {
            let min_dir = case_dir.join("min");
            if std::fs::create_dir_all(&min_dir).is_ok() {
                let _ = std::fs::write(min_dir.join("inserts.sql"), render_statements(&inserts));
                let _ = std::fs::write(min_dir.join("case.sql"), render_statements(&case_statements));
                let _ = std::fs::write(min_dir.join("repro.sql"), repro_sql);
            }
            tracing::info!(rounds, flaky, case_dir = %min_dir.display(), "minimized");
        }
        MinimizeOutcome::Skipped { reason } => {
            tracing::debug!(reason, "minimization skipped");
        }
    }
}

fn render_statements(statements: &[String]) -> String {
    let mut out = String::new();
    for stmt in statements {
        let trimmed = stmt.trim().trim_end_matches(';');
        if trimmed.is_empty() {
            continue;
        }
        out.push_str(trimmed);
        out.push_str(";\n");
    }
    out
}

fn capture_root(shared: &Shared) -> &Path {
    Path::new(shared.config.plan_replayer.output_dir.as_str())
}

async fn dump_tables(conn: &mut dyn Connection, schema: &SchemaState, max_rows: u64, cancel: &CancellationToken) -> String {
    let mut out = String::new();
    for idx in schema.base_table_indices() {
        let Some(table) = schema.table(idx) else { continue };
        out.push_str(&format!("# {}\n", table.name));

        let columns: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        out.push_str(&columns.join("\t"));
        out.push('\n');

        let sql = format!("SELECT * FROM `{}` LIMIT {max_rows}", table.name);
        match conn.exec_query(&sql, cancel).await {
            Ok(rows) => {
                for row in rows {
                    let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                    out.push_str(&cells.join("\t"));
                    out.push('\n');
                }
            }
            Err(err) => out.push_str(&format!("# sample query failed: {err}\n")),
        }
        out.push('\n');
    }
    out
}
