//! Random scalar generation for DDL column defaults and DML literals.
//! Mirrors `shiro-plancache::generator`'s per-category strategy (small
//! integers, short strings, a narrow date range) but produces [`Value`]
//! directly rather than a parameterized template.

use rand::Rng;

use shiro_types::{ColumnType, Value};

pub fn random_value(rng: &mut impl Rng, ty: &ColumnType, nullable: bool) -> Value {
    if nullable && rng.gen_bool(0.1) {
        return Value::Null;
    }
    match ty {
        ColumnType::TinyInt => Value::Int(rng.gen_range(-128..127)),
        ColumnType::Int => Value::Int(rng.gen_range(-10_000..10_000)),
        ColumnType::BigInt => Value::Int(rng.gen_range(-1_000_000..1_000_000)),
        ColumnType::Decimal { .. } | ColumnType::Double => {
            Value::Double((rng.gen_range(-1000..1000) as f64) / 100.0)
        }
        ColumnType::Varchar { max_len } => {
            let len = rng.gen_range(1..=(*max_len).min(8).max(1)) as usize;
            Value::Text(random_string(rng, len))
        }
        ColumnType::Text => Value::Text(random_string(rng, 16)),
        ColumnType::Date | ColumnType::DateTime | ColumnType::Timestamp => {
            let day = rng.gen_range(1..28);
            let month = rng.gen_range(1..12);
            let year = rng.gen_range(2000..2024);
            Value::Text(format!("{year:04}-{month:02}-{day:02}"))
        }
        ColumnType::Boolean => Value::Bool(rng.gen_bool(0.5)),
    }
}

fn random_string(rng: &mut impl Rng, len: usize) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    (0..len).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn non_nullable_column_never_yields_null() {
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..50 {
            assert!(!random_value(&mut rng, &ColumnType::Int, false).is_null());
        }
    }

    #[test]
    fn varchar_respects_max_len() {
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..20 {
            if let Value::Text(s) = random_value(&mut rng, &ColumnType::Varchar { max_len: 4 }, false) {
                assert!(s.len() <= 4);
            }
        }
    }
}
