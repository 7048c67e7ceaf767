//! Security checkers: statements that can destroy or expose unbounded data.
//!
//! Grounded on the teacher's `MissingWhereInUpdate`/`MissingWhereInDelete`
//! rules (`examples/RAprogramm-sql-query-analyzer/src/rules/security.rs`),
//! generalized from `Vec<Violation>` output to a single [`RiskScore`] and
//! extended to also catch a present-but-vacuous `WHERE` clause.

use super::{CheckerCategory, CheckerInfo, Checker, RiskLevel, RiskScore};
use crate::{config::CheckerConfig, context::SqlContext, query::QueryType};

/// Flags `UPDATE`/`DELETE` statements with no `WHERE` clause at all.
pub struct NoWhereClause;

impl Checker for NoWhereClause {
    fn info(&self) -> CheckerInfo {
        CheckerInfo {
            id:            "NoWhereClause",
            name:          "Missing WHERE clause",
            default_level: RiskLevel::Critical,
            category:      CheckerCategory::Security
        }
    }

    fn check(&self, ctx: &SqlContext, _config: &CheckerConfig) -> RiskScore {
        let Some(facts) = &ctx.facts else {
            return RiskScore::none();
        };
        let is_mutating = matches!(facts.query_type, QueryType::Update | QueryType::Delete);
        if is_mutating && !facts.has_where {
            return RiskScore::new(
                RiskLevel::Critical,
                100,
                format!("{} statement has no WHERE clause and will affect every row", facts.query_type)
            )
            .with_recommendation("Add a WHERE clause scoping this statement to the intended rows");
        }
        let is_unbounded_select = facts.query_type == QueryType::Select
            && !facts.has_where
            && facts.limit.is_none()
            && facts.offset.is_none();
        if is_unbounded_select {
            return RiskScore::new(
                RiskLevel::Critical,
                100,
                "SELECT statement has no WHERE clause and no bounded pagination; it reads the entire table"
            )
            .with_recommendation("Add a WHERE clause or a LIMIT/OFFSET to bound the rows read");
        }
        RiskScore::none()
    }
}

/// Flags a `WHERE` clause that is present but vacuous — a tautology that
/// filters nothing (`1=1`, or an `OR`-branch that reduces to one).
pub struct DummyCondition;

impl Checker for DummyCondition {
    fn info(&self) -> CheckerInfo {
        CheckerInfo {
            id:            "DummyCondition",
            name:          "Tautological WHERE clause",
            default_level: RiskLevel::Critical,
            category:      CheckerCategory::Security
        }
    }

    fn check(&self, ctx: &SqlContext, _config: &CheckerConfig) -> RiskScore {
        let Some(facts) = &ctx.facts else {
            return RiskScore::none();
        };
        if !facts.has_dummy_condition {
            return RiskScore::none();
        }
        let level = match facts.query_type {
            QueryType::Update | QueryType::Delete => RiskLevel::Critical,
            _ => RiskLevel::High
        };
        RiskScore::new(
            level,
            if level == RiskLevel::Critical { 100 } else { 70 },
            format!(
                "{} statement's WHERE clause is a tautology and filters no rows",
                facts.query_type
            )
        )
        .with_recommendation("Replace the tautological condition with a real filter predicate")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectId;

    fn ctx(sql: &str) -> SqlContext {
        SqlContext::parse(sql, DialectId::Generic)
    }

    #[test]
    fn flags_delete_without_where() {
        let risk = NoWhereClause.check(&ctx("DELETE FROM accounts"), &CheckerConfig::default());
        assert_eq!(risk.level, RiskLevel::Critical);
    }

    #[test]
    fn flags_update_without_where() {
        let risk = NoWhereClause.check(&ctx("UPDATE accounts SET balance = 0"), &CheckerConfig::default());
        assert_eq!(risk.level, RiskLevel::Critical);
    }

    #[test]
    fn allows_delete_with_where() {
        let risk = NoWhereClause.check(&ctx("DELETE FROM accounts WHERE id = 1"), &CheckerConfig::default());
        assert_eq!(risk.level, RiskLevel::None);
    }

    #[test]
    fn flags_unbounded_unfiltered_select() {
        let risk = NoWhereClause.check(&ctx("SELECT * FROM accounts"), &CheckerConfig::default());
        assert_eq!(risk.level, RiskLevel::Critical);
    }

    #[test]
    fn allows_select_with_limit_even_without_where() {
        let risk = NoWhereClause.check(&ctx("SELECT * FROM accounts LIMIT 50"), &CheckerConfig::default());
        assert_eq!(risk.level, RiskLevel::None);
    }

    #[test]
    fn flags_tautological_delete() {
        let risk = DummyCondition.check(&ctx("DELETE FROM accounts WHERE 1=1"), &CheckerConfig::default());
        assert_eq!(risk.level, RiskLevel::Critical);
    }

    #[test]
    fn flags_tautological_select_as_high_not_critical() {
        let risk = DummyCondition.check(
            &ctx("SELECT * FROM accounts WHERE status = 'active' OR 1=1"),
            &CheckerConfig::default()
        );
        assert_eq!(risk.level, RiskLevel::High);
    }

    #[test]
    fn allows_real_condition() {
        let risk = DummyCondition.check(&ctx("DELETE FROM accounts WHERE id = 1"), &CheckerConfig::default());
        assert_eq!(risk.level, RiskLevel::None);
    }
}
