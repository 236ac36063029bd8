//! AST-level SQL rewrites: a set of single-step simplifications applied
//! to a parsed `SELECT`/set-operation, each producing one smaller
//! candidate for the scoring rule in [`crate::scoring`] to accept or
//! reject. Each step parses the statement, mutates one node of its AST,
//! and re-renders it with `to_string()` rather than editing SQL text
//! directly.

use sqlparser::ast::{
    BinaryOperator, Expr, GroupByExpr, JoinOperator, Query, SetExpr, Statement, TableFactor, UnaryOperator,
    Value,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// Parses `sql` as a single query and returns every single-step AST
/// simplification that differs from the input. Non-query statements and
/// unparsable input produce no candidates -- the caller falls back to
/// delta-debugging over the statement list.
pub fn rewrite_candidates(sql: &str) -> Vec<String> {
    let dialect = GenericDialect {};
    let Ok(mut statements) = Parser::parse_sql(&dialect, sql) else {
        return Vec::new();
    };
    if statements.len() != 1 {
        return Vec::new();
    }
    let Statement::Query(query) = statements.remove(0) else {
        return Vec::new();
    };

    let base = query.to_string();
    let mut out = Vec::new();
    collect_candidates(&query, &base, &mut out);
    out
}

fn maybe_push(out: &mut Vec<String>, base: &str, candidate: Query) {
    let text = candidate.to_string();
    if text != base {
        out.push(text);
    }
}

fn collect_candidates(query: &Query, base: &str, out: &mut Vec<String>) {
    // WITH: only droppable when nothing downstream still names a CTE.
    if let Some(with) = &query.with {
        let mut without_with = query.clone();
        without_with.with = None;
        let remaining_text = without_with.to_string();
        let all_unused = with
            .cte_tables
            .iter()
            .all(|cte| !mentions_ident(&remaining_text, &cte.alias.name.value));
        if all_unused {
            maybe_push(out, base, without_with);
        }
    }

    for dropper in [drop_order_by, drop_limit, drop_offset, drop_locks, drop_fetch] {
        let mut c = query.clone();
        dropper(&mut c);
        maybe_push(out, base, c);
    }

    if let Some(order_by) = &query.order_by {
        if order_by.exprs.len() > 1 {
            for idx in 0..order_by.exprs.len() {
                let mut c = query.clone();
                if let Some(ob) = &mut c.order_by {
                    ob.exprs.remove(idx);
                }
                maybe_push(out, base, c);
            }
        }
    }

    if let SetExpr::Select(select) = query.body.as_ref() {
        if select.distinct.is_some() {
            let mut c = query.clone();
            if let SetExpr::Select(s) = c.body.as_mut() {
                s.distinct = None;
            }
            maybe_push(out, base, c);
        }

        if select.having.is_some() {
            let mut c = query.clone();
            if let SetExpr::Select(s) = c.body.as_mut() {
                s.having = None;
            }
            maybe_push(out, base, c);
        }

        if let GroupByExpr::Expressions(items, ..) = &select.group_by {
            if !items.is_empty() {
                let mut c = query.clone();
                if let SetExpr::Select(s) = c.body.as_mut() {
                    if let GroupByExpr::Expressions(items, ..) = &mut s.group_by {
                        items.clear();
                    }
                }
                maybe_push(out, base, c);
            }

            if items.len() > 1 {
                for idx in 0..items.len() {
                    let mut c = query.clone();
                    if let SetExpr::Select(s) = c.body.as_mut() {
                        if let GroupByExpr::Expressions(items, ..) = &mut s.group_by {
                            items.remove(idx);
                        }
                    }
                    maybe_push(out, base, c);
                }
            }
        }

        if !select.named_window.is_empty() {
            let mut c = query.clone();
            if let SetExpr::Select(s) = c.body.as_mut() {
                s.named_window.clear();
            }
            maybe_push(out, base, c);
        }

        if select.from.iter().any(|t| table_factor_has_hints(&t.relation)) {
            let mut c = query.clone();
            if let SetExpr::Select(s) = c.body.as_mut() {
                for table in &mut s.from {
                    clear_table_factor_hints(&mut table.relation);
                }
            }
            maybe_push(out, base, c);
        }

        if select.projection.len() > 1 {
            let mut c = query.clone();
            if let SetExpr::Select(s) = c.body.as_mut() {
                s.projection.truncate(1);
            }
            maybe_push(out, base, c);
        }

        if select.from.len() > 1 {
            let mut c = query.clone();
            if let SetExpr::Select(s) = c.body.as_mut() {
                s.from.truncate(1);
            }
            maybe_push(out, base, c);
        }

        if select.from.iter().any(|t| !t.joins.is_empty()) {
            let mut dropped = query.clone();
            if let SetExpr::Select(s) = dropped.body.as_mut() {
                for table in &mut s.from {
                    table.joins.clear();
                }
            }
            maybe_push(out, base, dropped);

            let mut crossed = query.clone();
            if let SetExpr::Select(s) = crossed.body.as_mut() {
                for table in &mut s.from {
                    for join in &mut table.joins {
                        join.join_operator = JoinOperator::CrossJoin;
                    }
                }
            }
            maybe_push(out, base, crossed);
        }

        if let Some(selection) = &select.selection {
            for replacement in where_candidates(selection) {
                let mut c = query.clone();
                if let SetExpr::Select(s) = c.body.as_mut() {
                    s.selection = replacement;
                }
                maybe_push(out, base, c);
            }
        }

        for (idx, table) in select.from.iter().enumerate() {
            if let TableFactor::Derived { subquery, .. } = &table.relation {
                for inner_sql in rewrite_candidates(&subquery.to_string()) {
                    let Ok(mut inner_stmts) = Parser::parse_sql(&dialect_for_recursion(), &inner_sql) else {
                        continue;
                    };
                    if inner_stmts.len() != 1 {
                        continue;
                    }
                    let Statement::Query(inner_query) = inner_stmts.remove(0) else {
                        continue;
                    };
                    let mut c = query.clone();
                    if let SetExpr::Select(s) = c.body.as_mut() {
                        if let TableFactor::Derived { subquery, .. } = &mut s.from[idx].relation {
                            *subquery = inner_query;
                        }
                    }
                    maybe_push(out, base, c);
                }
            }
        }
    }

    if let SetExpr::SetOperation { left, right, .. } = query.body.as_ref() {
        for pick_left in [true, false] {
            let side_sql = if pick_left { left.to_string() } else { right.to_string() };
            for candidate_sql in rewrite_candidates(&side_sql) {
                let Ok(mut stmts) = Parser::parse_sql(&dialect_for_recursion(), &candidate_sql) else {
                    continue;
                };
                if stmts.len() != 1 {
                    continue;
                }
                let Statement::Query(inner_query) = stmts.remove(0) else {
                    continue;
                };
                let mut c = query.clone();
                if let SetExpr::SetOperation { left, right, .. } = c.body.as_mut() {
                    if pick_left {
                        *left = inner_query.body;
                    } else {
                        *right = inner_query.body;
                    }
                }
                maybe_push(out, base, c);
            }
        }
    }
}

fn dialect_for_recursion() -> GenericDialect {
    GenericDialect {}
}

fn drop_order_by(query: &mut Query) {
    query.order_by = Default::default();
}

fn drop_limit(query: &mut Query) {
    query.limit = None;
}

fn drop_offset(query: &mut Query) {
    query.offset = None;
}

fn drop_locks(query: &mut Query) {
    query.locks = Default::default();
}

fn drop_fetch(query: &mut Query) {
    query.fetch = None;
}

fn table_factor_has_hints(factor: &TableFactor) -> bool {
    matches!(factor, TableFactor::Table { with_hints, .. } if !with_hints.is_empty())
}

fn clear_table_factor_hints(factor: &mut TableFactor) {
    if let TableFactor::Table { with_hints, .. } = factor {
        with_hints.clear();
    }
}

fn where_candidates(expr: &Expr) -> Vec<Option<Expr>> {
    let mut out = vec![None, Some(bool_literal(true)), Some(bool_literal(false))];
    match expr {
        Expr::BinaryOp { left, op, right } if matches!(op, BinaryOperator::And | BinaryOperator::Or) => {
            out.push(Some((**left).clone()));
            out.push(Some((**right).clone()));
        }
        Expr::UnaryOp { op: UnaryOperator::Not, expr: inner } => {
            out.push(Some((**inner).clone()));
        }
        _ => {}
    }
    out
}

fn bool_literal(value: bool) -> Expr {
    Expr::Value(Value::Boolean(value))
}

/// Whole-token (not substring) containment check used to decide whether a
/// CTE name is still referenced once the `WITH` clause is stripped.
fn mentions_ident(text: &str, name: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .any(|token| token.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_order_by_and_limit_independently() {
        let candidates = rewrite_candidates("SELECT a FROM t ORDER BY a LIMIT 10");
        assert!(candidates.iter().any(|c| !c.to_uppercase().contains("ORDER BY")));
        assert!(candidates.iter().any(|c| !c.to_uppercase().contains("LIMIT")));
    }

    #[test]
    fn drops_group_by_as_a_whole_clause_and_one_item_at_a_time() {
        let candidates = rewrite_candidates("SELECT a, b FROM t GROUP BY a, b");
        assert!(candidates.iter().any(|c| !c.to_uppercase().contains("GROUP BY")));
        assert!(candidates.iter().any(|c| c.to_uppercase().contains("GROUP BY A") && !c.contains(", b")));
        assert!(candidates.iter().any(|c| c.to_uppercase().contains("GROUP BY B") && !c.contains("a,")));
    }

    #[test]
    fn drops_order_by_items_one_at_a_time() {
        let candidates = rewrite_candidates("SELECT a, b FROM t ORDER BY a, b");
        assert!(candidates.iter().any(|c| c.to_uppercase().contains("ORDER BY A") && !c.contains(", b")));
        assert!(candidates.iter().any(|c| c.to_uppercase().contains("ORDER BY B") && !c.contains("a,")));
    }

    #[test]
    fn cte_is_only_dropped_when_unreferenced() {
        let referenced = rewrite_candidates("WITH cte_0 AS (SELECT 1 AS c0) SELECT c0 FROM cte_0");
        assert!(referenced.iter().all(|c| c.to_uppercase().contains("CTE_0")));

        let unreferenced = rewrite_candidates("WITH cte_0 AS (SELECT 1 AS c0) SELECT 2");
        assert!(unreferenced.iter().any(|c| !c.to_uppercase().contains("CTE_0")));
    }

    #[test]
    fn where_and_or_can_collapse_to_either_side() {
        let candidates = rewrite_candidates("SELECT a FROM t WHERE a = 1 AND b = 2");
        assert!(candidates.iter().any(|c| c.contains("a = 1") && !c.contains("b = 2")));
        assert!(candidates.iter().any(|c| c.contains("b = 2") && !c.contains("a = 1")));
    }

    #[test]
    fn joins_can_be_dropped_or_turned_into_a_cross_join() {
        let candidates = rewrite_candidates("SELECT a FROM t0 JOIN t1 ON t0.c0 = t1.c0");
        assert!(candidates.iter().any(|c| !c.to_uppercase().contains("JOIN")));
        assert!(candidates.iter().any(|c| c.to_uppercase().contains("CROSS JOIN")));
    }

    #[test]
    fn non_query_statements_produce_no_candidates() {
        assert!(rewrite_candidates("INSERT INTO t VALUES (1)").is_empty());
    }
}
