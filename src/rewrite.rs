//! Statement rewriters (spec.md §4.8).
//!
//! A [`Rewriter`] transforms a parsed `Statement` before it is handed to the
//! checker registry — e.g. injecting a tenant-scoping predicate or excluding
//! soft-deleted rows. Every rewriter in this module is idempotent: running
//! it twice produces the same statement as running it once, which matters
//! because the orchestrator may re-run the chain on retry.

use sqlparser::ast::{BinaryOperator, Expr, Ident, Select, SetExpr, Statement};

use crate::{
    error::{AppResult, rewriter_error},
    query::columns_in
};

/// A statement-level transformation applied before auditing.
pub trait Rewriter: Send + Sync {
    fn id(&self) -> &'static str;

    /// Transform `statement`. Returning `Err` aborts the in-flight
    /// orchestration for this one event (spec.md §7): a rewriter is trusted
    /// code, so a failure here usually means a bug, not bad input.
    fn rewrite(&self, statement: Statement) -> AppResult<Statement>;
}

/// Runs a fixed sequence of rewriters over one statement.
#[derive(Default)]
pub struct RewriteChain {
    rewriters: Vec<Box<dyn Rewriter>>
}

impl RewriteChain {
    pub fn new(rewriters: Vec<Box<dyn Rewriter>>) -> Self {
        Self {
            rewriters
        }
    }

    pub fn apply(&self, mut statement: Statement) -> AppResult<Statement> {
        for rewriter in &self.rewriters {
            statement = rewriter.rewrite(statement)?;
        }
        Ok(statement)
    }

    pub fn is_empty(&self) -> bool {
        self.rewriters.is_empty()
    }
}

fn equality_predicate(column: &str, value: Expr) -> Expr {
    Expr::BinaryOp {
        left:  Box::new(Expr::Identifier(Ident::new(column))),
        op:    BinaryOperator::Eq,
        right: Box::new(value)
    }
}

fn conjoin(existing: Option<Expr>, predicate: Expr) -> Expr {
    match existing {
        Some(existing) => Expr::BinaryOp {
            left:  Box::new(existing),
            op:    BinaryOperator::And,
            right: Box::new(predicate)
        },
        None => predicate
    }
}

fn inject_into_select(select: &mut Select, column: &str, predicate_value: impl Fn() -> Expr) {
    let already_present = select
        .selection
        .as_ref()
        .is_some_and(|sel| columns_in(sel).iter().any(|c| c.eq_ignore_ascii_case(column)));
    if already_present {
        return;
    }
    let predicate = equality_predicate(column, predicate_value());
    select.selection = Some(conjoin(select.selection.take(), predicate));
}

/// Injects `<column> = <value>` into every top-level `SELECT`/`UPDATE`/
/// `DELETE` selection that doesn't already reference the column, enforcing
/// row-level tenant isolation at the query layer.
pub struct TenantFilter {
    pub column: String,
    pub value:  Expr
}

impl Rewriter for TenantFilter {
    fn id(&self) -> &'static str {
        "TenantFilter"
    }

    fn rewrite(&self, mut statement: Statement) -> AppResult<Statement> {
        match &mut statement {
            Statement::Query(query) => {
                if let SetExpr::Select(select) = query.body.as_mut() {
                    inject_into_select(select, &self.column, || self.value.clone());
                }
                Ok(statement)
            }
            Statement::Update(update) => {
                let already_present = update
                    .selection
                    .as_ref()
                    .is_some_and(|sel| columns_in(sel).iter().any(|c| c.eq_ignore_ascii_case(&self.column)));
                if !already_present {
                    let predicate = equality_predicate(&self.column, self.value.clone());
                    update.selection = Some(conjoin(update.selection.take(), predicate));
                }
                Ok(statement)
            }
            Statement::Delete(delete) => {
                let already_present = delete
                    .selection
                    .as_ref()
                    .is_some_and(|sel| columns_in(sel).iter().any(|c| c.eq_ignore_ascii_case(&self.column)));
                if !already_present {
                    let predicate = equality_predicate(&self.column, self.value.clone());
                    delete.selection = Some(conjoin(delete.selection.take(), predicate));
                }
                Ok(statement)
            }
            _ => Err(rewriter_error(self.id(), "unsupported statement shape for tenant filtering"))
        }
    }
}

/// Injects `<column> IS NULL` into `SELECT` statements that don't already
/// reference the soft-delete marker column, excluding deleted rows by
/// default. Unlike [`TenantFilter`], this only touches `SELECT` — mutating
/// statements are left to the checkers (`NoWhereClause`, `DummyCondition`)
/// to flag rather than silently rewrite.
pub struct SoftDelete {
    pub column: String
}

impl Rewriter for SoftDelete {
    fn id(&self) -> &'static str {
        "SoftDelete"
    }

    fn rewrite(&self, mut statement: Statement) -> AppResult<Statement> {
        if let Statement::Query(query) = &mut statement
            && let SetExpr::Select(select) = query.body.as_mut()
        {
            inject_into_select(select, &self.column, || Expr::IsNull(Box::new(Expr::value(sqlparser::ast::Value::Null))));
        }
        Ok(statement)
    }
}

#[cfg(test)]
mod tests {
    use sqlparser::{ast::Value, dialect::GenericDialect, parser::Parser};

    use super::*;

    fn parse(sql: &str) -> Statement {
        Parser::parse_sql(&GenericDialect {}, sql).unwrap().remove(0)
    }

    #[test]
    fn tenant_filter_injects_predicate_on_select() {
        let filter = TenantFilter {
            column: "tenant_id".to_string(),
            value:  Expr::value(Value::Number("7".to_string(), false))
        };
        let rewritten = filter.rewrite(parse("SELECT * FROM orders")).unwrap();
        assert!(rewritten.to_string().to_lowercase().contains("tenant_id"));
    }

    #[test]
    fn tenant_filter_is_idempotent() {
        let filter = TenantFilter {
            column: "tenant_id".to_string(),
            value:  Expr::value(Value::Number("7".to_string(), false))
        };
        let once = filter.rewrite(parse("SELECT * FROM orders")).unwrap();
        let twice = filter.rewrite(once.clone()).unwrap();
        assert_eq!(once.to_string(), twice.to_string());
    }

    #[test]
    fn tenant_filter_skips_when_column_already_present() {
        let filter = TenantFilter {
            column: "tenant_id".to_string(),
            value:  Expr::value(Value::Number("7".to_string(), false))
        };
        let rewritten = filter
            .rewrite(parse("SELECT * FROM orders WHERE tenant_id = 9"))
            .unwrap();
        assert_eq!(rewritten.to_string().matches("tenant_id").count(), 1);
    }

    #[test]
    fn soft_delete_injects_is_null_on_select() {
        let rewriter = SoftDelete {
            column: "deleted_at".to_string()
        };
        let rewritten = rewriter.rewrite(parse("SELECT * FROM orders")).unwrap();
        assert!(rewritten.to_string().to_lowercase().contains("deleted_at"));
    }

    #[test]
    fn chain_applies_rewriters_in_order() {
        let chain = RewriteChain::new(vec![
            Box::new(TenantFilter {
                column: "tenant_id".to_string(),
                value:  Expr::value(Value::Number("1".to_string(), false))
            }),
            Box::new(SoftDelete {
                column: "deleted_at".to_string()
            }),
        ]);
        let rewritten = chain.apply(parse("SELECT * FROM orders")).unwrap();
        let sql = rewritten.to_string().to_lowercase();
        assert!(sql.contains("tenant_id"));
        assert!(sql.contains("deleted_at"));
    }
}
