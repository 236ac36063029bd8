//! Textual normalization applied to an `EXPLAIN` plan before hashing, so
//! two plans that differ only in generated table/column/index names or
//! literal constants still collide in the coverage digests.

fn normalize_token(token: &str) -> String {
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        return "<int>".to_string();
    }
    if let Some(rest) = token.strip_prefix('t') {
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            return "<table>".to_string();
        }
    }
    if let Some(rest) = token.strip_prefix('c') {
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            return "<column>".to_string();
        }
    }
    if token.starts_with("idx_") || token.starts_with("index_") {
        return "<index>".to_string();
    }
    token.to_string()
}

/// Replaces `tN`/`cN` identifiers, `idx_*`/`index_*` index names, and bare
/// integers with canonical tokens, leaving punctuation and whitespace
/// untouched so the plan's tree structure survives.
pub fn normalize_plan_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word = String::new();
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            word.push(ch);
        } else {
            if !word.is_empty() {
                out.push_str(&normalize_token(&word));
                word.clear();
            }
            out.push(ch);
        }
    }
    if !word.is_empty() {
        out.push_str(&normalize_token(&word));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_and_column_identifiers_collapse_to_canonical_tokens() {
        let normalized = normalize_plan_text("table:t3, index:idx_c1, cond: c1 > 5");
        assert!(normalized.contains("<table>"));
        assert!(normalized.contains("<index>"));
        assert!(normalized.contains("<column>"));
        assert!(normalized.contains("<int>"));
        assert!(!normalized.contains("t3"));
    }

    #[test]
    fn two_plans_differing_only_in_generated_names_normalize_identically() {
        let a = normalize_plan_text("TableReader data:TableFullScan table:t0");
        let b = normalize_plan_text("TableReader data:TableFullScan table:t7");
        assert_eq!(a, b);
    }
}
