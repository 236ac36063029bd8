//! Builds the final `repro.sql` from a minimization result (§4.8 output).

use shiro_types::{ReplayKind, ReplaySpec};

/// Assembles `repro.sql`: schema, then reduced inserts, then either the
/// replay spec's expected/actual SQL (with any `SET SESSION` preamble) or
/// the reduced case SQL for `case_error`/`error_sql`.
pub fn build_repro_sql(
    schema_sql: &str,
    inserts: &[String],
    case_statements: &[String],
    replay_spec: Option<&ReplaySpec>,
) -> String {
    let mut out = String::new();
    write_statements(&mut out, std::iter::once(schema_sql.trim_end()));
    write_statements(&mut out, inserts.iter().map(String::as_str));

    match replay_spec {
        Some(spec) if !matches!(spec.kind, ReplayKind::CaseError | ReplayKind::ErrorSql) => {
            if let Some((name, value)) = &spec.set_var {
                write_statements(&mut out, std::iter::once(format!("SET SESSION {name} = {value}").as_str()));
            }
            write_statements(&mut out, std::iter::once(spec.expected_sql.as_str()));
            if let Some(actual) = &spec.actual_sql {
                write_statements(&mut out, std::iter::once(actual.as_str()));
            }
        }
        Some(spec) => {
            if let Some((name, value)) = &spec.set_var {
                write_statements(&mut out, std::iter::once(format!("SET SESSION {name} = {value}").as_str()));
            }
            write_statements(&mut out, case_statements.iter().map(String::as_str));
        }
        None => {
            write_statements(&mut out, case_statements.iter().map(String::as_str));
        }
    }

    out
}

fn write_statements<'a>(out: &mut String, statements: impl Iterator<Item = &'a str>) {
    for stmt in statements {
        let trimmed = stmt.trim().trim_end_matches(';');
        if trimmed.is_empty() {
            continue;
        }
        out.push_str(trimmed);
        out.push_str(";\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_replay_includes_expected_and_actual() {
        let spec = ReplaySpec::new(ReplayKind::Signature, "SELECT 1").with_actual("SELECT /*+ X */ 1");
        let out = build_repro_sql("CREATE TABLE t (c0 INT)", &["INSERT INTO t VALUES (1)".into()], &[], Some(&spec));
        assert!(out.contains("CREATE TABLE t"));
        assert!(out.contains("INSERT INTO t"));
        assert!(out.contains("SELECT 1;"));
        assert!(out.contains("SELECT /*+ X */ 1;"));
    }

    #[test]
    fn case_error_replay_uses_the_reduced_case_statements() {
        let spec = ReplaySpec::new(ReplayKind::CaseError, "unused");
        let out = build_repro_sql("CREATE TABLE t (c0 INT)", &[], &["SELECT 1/0".into()], Some(&spec));
        assert!(out.contains("SELECT 1/0;"));
        assert!(!out.contains("unused"));
    }

    #[test]
    fn set_var_preamble_is_emitted_when_present() {
        let spec = ReplaySpec::new(ReplayKind::Signature, "SELECT @@x").with_set_var("sql_mode", "''");
        let out = build_repro_sql("", &[], &[], Some(&spec));
        assert!(out.contains("SET SESSION sql_mode = '';"));
    }
}
