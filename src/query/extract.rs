mod expr;
mod set_expr;
mod table;

use compact_str::CompactString;
pub use expr::{extract_columns_from_expr, is_dummy_condition, split_top_level_and};
use indexmap::IndexSet;
pub use set_expr::extract_from_set_expr;

use super::types::{ColumnVec, WindowFunction};

/// Context for extracting query metadata
pub struct ExtractionContext<'a> {
    pub tables:       &'a mut IndexSet<CompactString>,
    pub where_cols:   &'a mut IndexSet<CompactString>,
    pub join_cols:    &'a mut IndexSet<CompactString>,
    pub group_cols:   &'a mut IndexSet<CompactString>,
    pub having_cols:  &'a mut IndexSet<CompactString>,
    pub window_funcs: &'a mut Vec<WindowFunction>,
    pub has_union:    &'a mut bool,
    pub has_distinct: &'a mut bool,
    pub has_subquery: &'a mut bool,
    pub has_where:            &'a mut bool,
    pub has_dummy_condition:  &'a mut bool,
    pub and_conjunct_columns: &'a mut Vec<ColumnVec>
}

/// Facts derived from a single `WHERE`-clause expression, independent of
/// the surrounding statement shape. Shared by the `SELECT` path
/// (`set_expr.rs`, via [`extract_from_selection`]) and the direct
/// `UPDATE`/`DELETE` paths (`query.rs`).
pub struct WhereFacts {
    pub where_cols:           IndexSet<CompactString>,
    pub has_dummy_condition:  bool,
    pub and_conjunct_columns: Vec<ColumnVec>
}

pub fn extract_where_facts(selection: &sqlparser::ast::Expr) -> WhereFacts {
    let mut where_cols = IndexSet::new();
    extract_columns_from_expr(selection, &mut where_cols);

    let has_dummy_condition = is_dummy_condition(selection);

    let mut conjuncts = Vec::new();
    split_top_level_and(selection, &mut conjuncts);
    let and_conjunct_columns = conjuncts
        .into_iter()
        .map(|conjunct| {
            let mut cols = IndexSet::new();
            extract_columns_from_expr(conjunct, &mut cols);
            cols.into_iter().collect()
        })
        .collect();

    WhereFacts {
        where_cols,
        has_dummy_condition,
        and_conjunct_columns
    }
}

/// Populate the selection-derived fields of an [`ExtractionContext`] from a
/// `WHERE`-clause expression.
pub fn extract_from_selection(selection: &sqlparser::ast::Expr, ctx: &mut ExtractionContext<'_>) {
    *ctx.has_where = true;
    let facts = extract_where_facts(selection);
    ctx.where_cols.extend(facts.where_cols);
    *ctx.has_dummy_condition = facts.has_dummy_condition;
    ctx.and_conjunct_columns
        .extend(facts.and_conjunct_columns);
}
