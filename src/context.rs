//! [`SqlContext`]: the single input every [`crate::checkers::Checker`] sees
//! (spec.md §3, §4.3).
//!
//! A context bundles three independent layers that can each fail on their
//! own without failing the others: the raw text always survives, the
//! tokenizer-based fingerprint never fails, and the AST-derived `facts` are
//! `None` when `sqlparser` rejects the statement (e.g. a dialect-specific
//! construct the generic grammar doesn't recognize). Checkers that need
//! `facts` simply find nothing to flag when they're absent; they must never
//! panic on a `None`.

use std::time::Duration;

use crate::{
    dialect::{self, DialectId},
    error::AppResult,
    fingerprint::{CommandType, ParamBinding, SqlFingerprint, normalize},
    query::{self, Query}
};

/// Execution-side facts available only for queries observed at runtime
/// (spec.md §4.4: `SlowQuery`, `ErrorRate`). Absent for purely static,
/// scanner-sourced contexts.
#[derive(Debug, Clone, Default)]
pub struct ExecutionMetadata {
    pub mapper_id:     Option<String>,
    pub latency:       Option<Duration>,
    pub succeeded:     Option<bool>,
    pub rows_examined: Option<u64>,
    pub rows_returned: Option<u64>
}

/// Everything a checker can inspect about one SQL statement.
#[derive(Debug, Clone)]
pub struct SqlContext {
    pub raw_sql:      String,
    pub dialect:      DialectId,
    pub fingerprint:  SqlFingerprint,
    pub command_type: CommandType,
    pub params:       Vec<ParamBinding>,
    /// AST-derived structural facts (tables, where/order/group columns,
    /// limit/offset, dummy-condition detection, ...). `None` when the
    /// statement failed to parse under the resolved dialect.
    pub facts:        Option<Query>,
    pub execution:    ExecutionMetadata
}

impl SqlContext {
    /// Build a context from raw SQL text. Never fails: a parse failure
    /// degrades `facts` to `None` rather than propagating an error, since
    /// fingerprinting and command-type classification still succeed.
    pub fn parse(raw_sql: &str, dialect: DialectId) -> Self {
        let normalized = normalize(raw_sql);
        let facts = parse_first_statement(raw_sql, dialect);
        Self {
            raw_sql: raw_sql.to_string(),
            dialect,
            fingerprint: normalized.fingerprint,
            command_type: normalized.command_type,
            params: normalized.params,
            facts,
            execution: ExecutionMetadata::default()
        }
    }

    pub fn with_execution(mut self, execution: ExecutionMetadata) -> Self {
        self.execution = execution;
        self
    }

    /// `true` when this context carries parsed AST facts. Checkers that can
    /// only act on `facts` should treat `false` as "nothing to report", not
    /// an error.
    pub fn has_facts(&self) -> bool {
        self.facts.is_some()
    }
}

/// A batch of SQL may contain more than one statement (e.g. a migration
/// script); only the first is analyzed as the context's primary facts.
/// Multi-statement batches are out of scope for per-statement risk scoring
/// (spec.md §2 Non-goals: no query rewriting/execution across statements).
fn parse_first_statement(raw_sql: &str, dialect: DialectId) -> Option<Query> {
    let parser_dialect = dialect::to_parser_dialect(dialect);
    let parsed: AppResult<Vec<Query>> = query::parse_queries(raw_sql, parser_dialect);
    parsed.ok().and_then(|mut stmts| {
        if stmts.is_empty() {
            None
        } else {
            Some(stmts.remove(0))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_succeeds_for_valid_sql() {
        let ctx = SqlContext::parse("SELECT id FROM users WHERE id = 1", DialectId::Generic);
        assert!(ctx.has_facts());
        assert_eq!(ctx.command_type, CommandType::Select);
    }

    #[test]
    fn parse_degrades_gracefully_on_garbage() {
        let ctx = SqlContext::parse("not sql at all ((((", DialectId::Generic);
        assert!(!ctx.has_facts());
        // fingerprinting still succeeds unconditionally.
        assert_ne!(ctx.fingerprint.0, 0);
    }

    #[test]
    fn dialect_is_preserved() {
        let ctx = SqlContext::parse("SELECT 1", DialectId::PostgreSql);
        assert_eq!(ctx.dialect, DialectId::PostgreSql);
    }
}
