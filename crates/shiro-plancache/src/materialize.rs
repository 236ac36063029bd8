//! Turns a `?`-parameterized query template plus an argument vector into a
//! concrete SQL string, and renders a single [`Value`] as a SQL literal.

use shiro_types::Value;

/// Replaces each `?` placeholder in `template`, left to right, with the SQL
/// literal rendering of the corresponding argument. Panics if the argument
/// count doesn't match the placeholder count — both are always produced
/// together by the same [`crate::generator::ParamGenerator`] call, so a
/// mismatch is a bug in the generator, not a runtime condition to recover
/// from.
pub fn materialize(template: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(template.len() + args.len() * 4);
    let mut arg_iter = args.iter();
    for part in template.split('?') {
        out.push_str(part);
        if let Some(arg) = arg_iter.next() {
            out.push_str(&sql_literal(arg));
        }
    }
    assert!(arg_iter.next().is_none(), "more arguments than placeholders in template");
    out
}

/// Renders `value` as a literal usable directly in SQL text.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "TRUE".to_string() } else { "FALSE".to_string() },
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Bytes(b) => format!("x'{}'", b.iter().map(|byte| format!("{byte:02x}")).collect::<String>()),
        Value::DateTime(dt) => format!("'{dt}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_substituted_in_order() {
        let sql = materialize("SELECT * FROM t WHERE a > ? AND b < ?", &[Value::Int(1), Value::Int(2)]);
        assert_eq!(sql, "SELECT * FROM t WHERE a > 1 AND b < 2");
    }

    #[test]
    fn text_literals_escape_embedded_quotes() {
        assert_eq!(sql_literal(&Value::Text("it's".to_string())), "'it\\'s'");
    }

    #[test]
    fn null_materializes_to_sql_null() {
        let sql = materialize("WHERE a = ?", &[Value::Null]);
        assert_eq!(sql, "WHERE a = NULL");
    }
}
