//! The row fingerprint: a `(row_count, XOR-of-per-row CRC32)` pair used
//! throughout the oracle set as an equality witness over a result set,
//! without holding the whole result set in memory to compare it.

use crate::value::Value;

/// A normalizing signature over a stream of rows. Two streams with equal
/// signatures are considered equal by every oracle in this workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Signature {
    pub row_count: u64,
    pub checksum: u32,
}

impl Signature {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Folds one row into the running signature. `round_scale` is the
    /// number of decimal digits numeric values are truncated to before
    /// hashing, so that e.g. `1.000` and `1.009` normalize identically at
    /// `round_scale = 2`.
    pub fn fold_row(&mut self, row: &[Value], round_scale: u32) {
        let text = normalize_row(row, round_scale);
        self.checksum ^= crc32fast::hash(text.as_bytes());
        self.row_count += 1;
    }
}

/// Computes the signature of a full result set in one call.
pub fn compute_signature(rows: &[Vec<Value>], round_scale: u32) -> Signature {
    let mut sig = Signature::empty();
    for row in rows {
        sig.fold_row(row, round_scale);
    }
    sig
}

fn normalize_row(row: &[Value], round_scale: u32) -> String {
    row.iter()
        .map(|v| normalize_value(v, round_scale))
        .collect::<Vec<_>>()
        .join("#")
}

fn normalize_value(value: &Value, round_scale: u32) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => truncate_numeric(*i as f64, round_scale),
        Value::UInt(u) => truncate_numeric(*u as f64, round_scale),
        Value::Double(d) => truncate_numeric(*d, round_scale),
        Value::Text(s) => match s.parse::<f64>() {
            Ok(f) => truncate_numeric(f, round_scale),
            Err(_) => s.clone(),
        },
        Value::Bytes(b) => b.iter().map(|byte| format!("{byte:02x}")).collect(),
        Value::DateTime(dt) => dt.to_string(),
    }
}

/// Truncates (never rounds) `value` to `round_scale` decimal digits and
/// formats it with exactly that many digits after the point.
fn truncate_numeric(value: f64, round_scale: u32) -> String {
    let scale = 10f64.powi(round_scale as i32);
    let truncated = (value * scale).trunc() / scale;
    format!("{truncated:.*}", round_scale as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_not_rounding_is_used_for_numeric_normalization() {
        assert_eq!(truncate_numeric(1.009, 2), "1.00");
        assert_eq!(truncate_numeric(1.000, 2), "1.00");
    }

    #[test]
    fn scenario_row_fingerprint_numeric_normalization() {
        let rows = vec![
            vec![Value::Text("1.000".to_string())],
            vec![Value::Int(1)],
        ];
        let sig = compute_signature(&rows, 2);
        assert_eq!(sig.row_count, 2);
        let single = crc32fast::hash(b"1.00");
        assert_eq!(sig.checksum, single ^ single);

        let rows_changed = vec![
            vec![Value::Text("1.000".to_string())],
            vec![Value::Text("1.009".to_string())],
        ];
        let sig_changed = compute_signature(&rows_changed, 2);
        assert_eq!(sig_changed.checksum, sig.checksum);
    }

    #[test]
    fn different_row_counts_are_different_signatures() {
        let a = compute_signature(&[vec![Value::Int(1)]], 2);
        let b = compute_signature(&[vec![Value::Int(1)], vec![Value::Int(1)]], 2);
        assert_ne!(a, b);
    }

    #[test]
    fn commutative_iff_rows_distinct_after_normalization() {
        let rows_distinct = vec![vec![Value::Int(1)], vec![Value::Int(2)]];
        let rows_reordered = vec![vec![Value::Int(2)], vec![Value::Int(1)]];
        assert_eq!(
            compute_signature(&rows_distinct, 2),
            compute_signature(&rows_reordered, 2)
        );

        // Duplicate rows: XOR cancels a pair, so reordering the duplicate
        // doesn't exercise commutativity in an interesting way, but a
        // stream with a repeated row folded in a different grouping still
        // XORs to the same value because XOR is associative/commutative
        // regardless of order.
        let rows_dup = vec![vec![Value::Int(1)], vec![Value::Int(1)], vec![Value::Int(2)]];
        let rows_dup_reordered = vec![vec![Value::Int(2)], vec![Value::Int(1)], vec![Value::Int(1)]];
        assert_eq!(
            compute_signature(&rows_dup, 2),
            compute_signature(&rows_dup_reordered, 2)
        );
    }
}
