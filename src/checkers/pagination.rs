//! Pagination and scan-cost checkers (spec.md §4.4).
//!
//! Grounded on the teacher's `LargeOffset` rule
//! (`examples/RAprogramm-sql-query-analyzer/src/rules/performance.rs`),
//! generalized from a single offset-threshold rule into the five-checker
//! pagination family the specification requires: whether pagination is used
//! at all, whether it's deterministic, how deep it reaches, how wide a page
//! is, and whether it's scoped by a filter.

use std::collections::HashSet;

use super::{CheckerCategory, CheckerInfo, Checker, RiskLevel, RiskScore};
use crate::{config::CheckerConfig, context::SqlContext, query::QueryType};

const DEFAULT_DEEP_OFFSET_THRESHOLD: u64 = 10_000;
const DEFAULT_LARGE_PAGE_THRESHOLD: u64 = 1_000;

fn is_select(ctx: &SqlContext) -> bool {
    matches!(
        ctx.facts.as_ref().map(|f| &f.query_type),
        Some(QueryType::Select)
    )
}

/// Tables configured as large under `NoPagination`'s `tables` key. Empty
/// means unconfigured: every unbounded `SELECT` is in scope, matching the
/// checker's behavior before a whitelist is set up.
fn large_table_set(config: &CheckerConfig) -> HashSet<String> {
    config
        .file
        .columns("tables")
        .into_iter()
        .map(|t| t.to_lowercase())
        .collect()
}

/// Flags `SELECT` statements with no `LIMIT` at all, scoped to a configured
/// set of large tables once one is set up (spec.md §4.4: "trigger is a
/// whitelisted large table").
pub struct NoPagination;

impl Checker for NoPagination {
    fn info(&self) -> CheckerInfo {
        CheckerInfo {
            id:            "NoPagination",
            name:          "SELECT without a LIMIT clause",
            default_level: RiskLevel::High,
            category:      CheckerCategory::Performance
        }
    }

    fn check(&self, ctx: &SqlContext, config: &CheckerConfig) -> RiskScore {
        if !is_select(ctx) {
            return RiskScore::none();
        }
        let Some(facts) = &ctx.facts else {
            return RiskScore::none();
        };
        if facts.limit.is_some() {
            return RiskScore::none();
        }
        let large_tables = large_table_set(config);
        let in_scope = large_tables.is_empty()
            || facts
                .tables
                .iter()
                .any(|t| large_tables.contains(t.to_lowercase().as_str()));
        if !in_scope {
            return RiskScore::none();
        }
        RiskScore::new(
            RiskLevel::High,
            65,
            "SELECT has no LIMIT clause; the full result set is materialized"
        )
        .with_recommendation("Add a LIMIT clause and paginate the result set")
    }
}

/// Flags paginated `SELECT` statements with no `ORDER BY` — page boundaries
/// are not guaranteed stable across executions without one.
pub struct MissingOrderBy;

impl Checker for MissingOrderBy {
    fn info(&self) -> CheckerInfo {
        CheckerInfo {
            id:            "MissingOrderBy",
            name:          "Paginated SELECT without ORDER BY",
            default_level: RiskLevel::Medium,
            category:      CheckerCategory::Performance
        }
    }

    fn check(&self, ctx: &SqlContext, _config: &CheckerConfig) -> RiskScore {
        if !is_select(ctx) {
            return RiskScore::none();
        }
        let Some(facts) = &ctx.facts else {
            return RiskScore::none();
        };
        let is_paginated = facts.limit.is_some() || facts.offset.is_some();
        if is_paginated && facts.order_cols.is_empty() {
            RiskScore::new(
                RiskLevel::Medium,
                50,
                "Paginated SELECT has no ORDER BY; row order across pages is undefined"
            )
            .with_recommendation("Add an ORDER BY on a column with a stable, unique ordering")
        } else {
            RiskScore::none()
        }
    }
}

/// Flags an `OFFSET` deep enough that the database must scan and discard a
/// large number of rows before returning a page.
pub struct DeepPagination;

impl Checker for DeepPagination {
    fn info(&self) -> CheckerInfo {
        CheckerInfo {
            id:            "DeepPagination",
            name:          "OFFSET exceeds the deep-pagination threshold",
            default_level: RiskLevel::High,
            category:      CheckerCategory::Performance
        }
    }

    fn check(&self, ctx: &SqlContext, config: &CheckerConfig) -> RiskScore {
        if !is_select(ctx) {
            return RiskScore::none();
        }
        let Some(facts) = &ctx.facts else {
            return RiskScore::none();
        };
        let threshold = config
            .file
            .threshold_u64("threshold")
            .unwrap_or(DEFAULT_DEEP_OFFSET_THRESHOLD);
        match facts.offset {
            Some(offset) if offset > threshold => RiskScore::new(
                RiskLevel::High,
                65,
                format!("OFFSET {offset} exceeds the deep-pagination threshold of {threshold}")
            )
            .with_recommendation("Use keyset (seek) pagination instead of a large OFFSET")
            .with_metadata("offset", offset.to_string())
            .with_metadata("threshold", threshold.to_string()),
            _ => RiskScore::none()
        }
    }
}

/// Flags a `LIMIT` wide enough to pull an excessive page size per request.
pub struct LargePageSize;

impl Checker for LargePageSize {
    fn info(&self) -> CheckerInfo {
        CheckerInfo {
            id:            "LargePageSize",
            name:          "LIMIT exceeds the large-page-size threshold",
            default_level: RiskLevel::Medium,
            category:      CheckerCategory::Performance
        }
    }

    fn check(&self, ctx: &SqlContext, config: &CheckerConfig) -> RiskScore {
        if !is_select(ctx) {
            return RiskScore::none();
        }
        let Some(facts) = &ctx.facts else {
            return RiskScore::none();
        };
        let threshold = config
            .file
            .threshold_u64("threshold")
            .unwrap_or(DEFAULT_LARGE_PAGE_THRESHOLD);
        match facts.limit {
            Some(limit) if limit > threshold => RiskScore::new(
                RiskLevel::Medium,
                50,
                format!("LIMIT {limit} exceeds the configured page-size threshold of {threshold}")
            )
            .with_recommendation("Reduce the page size or stream results instead of paging")
            .with_metadata("limit", limit.to_string()),
            _ => RiskScore::none()
        }
    }
}

/// Flags paginated `SELECT` statements with no `WHERE` clause — every page
/// re-scans the entire table to find its slice.
pub struct NoConditionPagination;

impl Checker for NoConditionPagination {
    fn info(&self) -> CheckerInfo {
        CheckerInfo {
            id:            "NoConditionPagination",
            name:          "Paginated SELECT with no WHERE clause",
            default_level: RiskLevel::High,
            category:      CheckerCategory::Performance
        }
    }

    fn check(&self, ctx: &SqlContext, _config: &CheckerConfig) -> RiskScore {
        if !is_select(ctx) {
            return RiskScore::none();
        }
        let Some(facts) = &ctx.facts else {
            return RiskScore::none();
        };
        let is_paginated = facts.limit.is_some() || facts.offset.is_some();
        if is_paginated && !facts.has_where {
            RiskScore::new(
                RiskLevel::High,
                70,
                "Paginated SELECT has no WHERE clause; every page scans the full table"
            )
            .with_recommendation("Add a filter that narrows the scanned row set before paginating")
        } else {
            RiskScore::none()
        }
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
    fn no_pagination_flags_unbounded_select() {
        let risk = NoPagination.check(&ctx("SELECT * FROM events"), &CheckerConfig::default());
        assert_eq!(risk.level, RiskLevel::High);
    }

    #[test]
    fn no_pagination_allows_limited_select() {
        let risk = NoPagination.check(&ctx("SELECT * FROM events LIMIT 50"), &CheckerConfig::default());
        assert_eq!(risk.level, RiskLevel::None);
    }

    #[test]
    fn no_pagination_is_gated_to_a_configured_large_table() {
        let cfg = config_with_tables(&["events"]);
        let flagged = NoPagination.check(&ctx("SELECT * FROM events"), &cfg);
        assert_eq!(flagged.level, RiskLevel::High);

        let unflagged = NoPagination.check(&ctx("SELECT * FROM small_lookup"), &cfg);
        assert_eq!(unflagged.level, RiskLevel::None);
    }

    fn config_with_tables(tables: &[&str]) -> CheckerConfig {
        let yaml = format!("enabled: true\ntables: [{}]\n", tables.join(", "));
        let raw: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let file: crate::config::FileCheckerConfig = serde_yaml::from_value(raw).unwrap();
        CheckerConfig {
            enabled: true,
            severity_override: None,
            file
        }
    }

    #[test]
    fn missing_order_by_flags_paginated_without_order() {
        let risk = MissingOrderBy.check(
            &ctx("SELECT * FROM events LIMIT 50 OFFSET 100"),
            &CheckerConfig::default()
        );
        assert_eq!(risk.level, RiskLevel::Medium);
    }

    #[test]
    fn missing_order_by_allows_when_ordered() {
        let risk = MissingOrderBy.check(
            &ctx("SELECT * FROM events ORDER BY id LIMIT 50"),
            &CheckerConfig::default()
        );
        assert_eq!(risk.level, RiskLevel::None);
    }

    #[test]
    fn deep_pagination_flags_large_offset() {
        let risk = DeepPagination.check(
            &ctx("SELECT * FROM events ORDER BY id LIMIT 50 OFFSET 50000"),
            &CheckerConfig::default()
        );
        assert_eq!(risk.level, RiskLevel::High);
    }

    #[test]
    fn large_page_size_flags_wide_limit() {
        let risk = LargePageSize.check(
            &ctx("SELECT * FROM events ORDER BY id LIMIT 5000"),
            &CheckerConfig::default()
        );
        assert_eq!(risk.level, RiskLevel::Medium);
    }

    #[test]
    fn no_condition_pagination_flags_missing_where() {
        let risk = NoConditionPagination.check(
            &ctx("SELECT * FROM events ORDER BY id LIMIT 50"),
            &CheckerConfig::default()
        );
        assert_eq!(risk.level, RiskLevel::High);
    }

    #[test]
    fn no_condition_pagination_allows_filtered_select() {
        let risk = NoConditionPagination.check(
            &ctx("SELECT * FROM events WHERE tenant_id = 1 ORDER BY id LIMIT 50"),
            &CheckerConfig::default()
        );
        assert_eq!(risk.level, RiskLevel::None);
    }
}
