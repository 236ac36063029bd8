//! Scalar values used for row fingerprints and query results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single SQL scalar, wide enough to hold anything the executor hands
/// back from a result set row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(chrono::NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Bytes fed to the row fingerprint's CRC32. Distinct variants never
    /// collide because each is prefixed with a tag byte before its payload.
    pub fn fingerprint_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Value::Null => out.push(0),
            Value::Bool(b) => {
                out.push(1);
                out.push(u8::from(*b));
            }
            Value::Int(i) => {
                out.push(2);
                out.extend_from_slice(&i.to_le_bytes());
            }
            Value::UInt(u) => {
                out.push(3);
                out.extend_from_slice(&u.to_le_bytes());
            }
            Value::Double(d) => {
                out.push(4);
                out.extend_from_slice(&d.to_bits().to_le_bytes());
            }
            Value::Text(s) => {
                out.push(5);
                out.extend_from_slice(s.as_bytes());
            }
            Value::Bytes(b) => {
                out.push(6);
                out.extend_from_slice(b);
            }
            Value::DateTime(dt) => {
                out.push(7);
                out.extend_from_slice(dt.and_utc().timestamp_micros().to_le_bytes().as_slice());
            }
        }
        out
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::UInt(u) => write!(f, "{u}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "0x{}", hex_encode(b)),
            Value::DateTime(dt) => write!(f, "{dt}"),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_variants_have_distinct_fingerprint_prefixes() {
        let null = Value::Null.fingerprint_bytes();
        let zero_int = Value::Int(0).fingerprint_bytes();
        assert_ne!(null, zero_int);
    }

    #[test]
    fn equal_values_fingerprint_equal() {
        assert_eq!(
            Value::Text("a".into()).fingerprint_bytes(),
            Value::Text("a".into()).fingerprint_bytes()
        );
    }

    #[test]
    fn display_is_human_readable() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Null.to_string(), "NULL");
    }
}
