//! Column allow/deny-list policy checkers (spec.md §4.4, §9 Open Questions).
//!
//! Both checkers read their column list from the checker's config section
//! (`columns: [...]`) and do nothing when it is empty — an unconfigured
//! policy checker is a no-op, not a default-deny.
//!
//! **BlacklistOnly** resolves the conjunction-semantics Open Question as:
//! flag only when *every* top-level `AND`-conjunct of the `WHERE` clause
//! references exclusively blacklisted columns. A conjunct with at least one
//! non-blacklisted column (however it's nested under `OR`) is not
//! blacklist-only, and suppresses the finding for the whole statement —
//! mirroring how one legitimate filter branch can redeem an otherwise
//! suspicious clause.

use std::collections::HashSet;

use super::{CheckerCategory, CheckerInfo, Checker, RiskLevel, RiskScore};
use crate::{config::CheckerConfig, context::SqlContext};

fn column_set(config: &CheckerConfig) -> HashSet<String> {
    config
        .file
        .columns("columns")
        .into_iter()
        .map(|c| c.to_lowercase())
        .collect()
}

pub struct BlacklistOnly;

impl Checker for BlacklistOnly {
    fn info(&self) -> CheckerInfo {
        CheckerInfo {
            id:            "BlacklistOnly",
            name:          "WHERE clause filters only on blacklisted columns",
            default_level: RiskLevel::High,
            category:      CheckerCategory::Policy
        }
    }

    fn check(&self, ctx: &SqlContext, config: &CheckerConfig) -> RiskScore {
        let blacklist = column_set(config);
        if blacklist.is_empty() {
            return RiskScore::none();
        }
        let Some(facts) = &ctx.facts else {
            return RiskScore::none();
        };
        if !facts.has_where || facts.and_conjunct_columns.is_empty() {
            return RiskScore::none();
        }

        let all_conjuncts_blacklist_only = facts.and_conjunct_columns.iter().all(|conjunct| {
            !conjunct.is_empty()
                && conjunct
                    .iter()
                    .all(|col| blacklist.contains(col.to_lowercase().as_str()))
        });

        if all_conjuncts_blacklist_only {
            RiskScore::new(
                RiskLevel::High,
                75,
                "WHERE clause filters exclusively on blacklisted columns, masking the real query intent"
            )
            .with_recommendation("Add a filter on a non-administrative column, or remove the blacklisted condition")
        } else {
            RiskScore::none()
        }
    }
}

pub struct WhitelistOnly;

impl Checker for WhitelistOnly {
    fn info(&self) -> CheckerInfo {
        CheckerInfo {
            id:            "WhitelistOnly",
            name:          "WHERE clause missing a required whitelisted column",
            default_level: RiskLevel::Medium,
            category:      CheckerCategory::Policy
        }
    }

    fn check(&self, ctx: &SqlContext, config: &CheckerConfig) -> RiskScore {
        let whitelist = column_set(config);
        if whitelist.is_empty() {
            return RiskScore::none();
        }
        let Some(facts) = &ctx.facts else {
            return RiskScore::none();
        };
        if !facts.has_where {
            return RiskScore::none();
        }

        let references_whitelisted = facts
            .where_cols
            .iter()
            .any(|col| whitelist.contains(col.to_lowercase().as_str()));

        if references_whitelisted {
            RiskScore::none()
        } else {
            RiskScore::new(
                RiskLevel::Medium,
                55,
                "WHERE clause does not reference any required isolation column"
            )
            .with_recommendation("Add a filter on one of the configured required columns (e.g. tenant_id)")
        }
    }
}
