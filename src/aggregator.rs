//! Risk aggregation (spec.md §4.6, component F).
//!
//! Combines every checker's [`CheckerResult`] for one [`SqlContext`] into a
//! single [`AuditReport`]: the overall risk is a max-reduction over the
//! individual [`RiskLevel`]s, and messages/recommendations are concatenated
//! in deterministic `checkerId` order so two runs over the same input always
//! render identically.

use serde::Serialize;

use crate::{
    checkers::{CheckerResult, RiskLevel},
    context::SqlContext,
    fingerprint::{CommandType, SqlFingerprint}
};

/// The aggregated outcome of auditing one SQL statement.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub fingerprint:      SqlFingerprint,
    pub command_type:     CommandType,
    pub raw_sql:          String,
    pub overall_risk:     RiskLevel,
    /// Highest `numeric` score among the findings driving `overall_risk`,
    /// i.e. the same max-reduction as `overall_risk` but over the 0-100
    /// scale instead of the level enum.
    pub overall_score:    u8,
    pub results:          Vec<CheckerResult>,
    pub failed_checkers:  Vec<String>,
    /// Messages from every non-`NONE` successful checker, `checkerId`-sorted.
    pub messages:         Vec<String>,
    pub recommendations:  Vec<String>
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.overall_risk == RiskLevel::None
    }
}

/// Fold checker results for `ctx` into one report. Results are sorted by
/// `checker_id` first so the fold (and every downstream rendering) is
/// order-independent with respect to how the dispatcher scheduled checkers.
pub fn aggregate(ctx: &SqlContext, mut results: Vec<CheckerResult>) -> AuditReport {
    results.sort_by(|a, b| a.checker_id.cmp(b.checker_id));

    let overall_risk = results
        .iter()
        .filter_map(|r| r.risk.as_ref())
        .map(|r| r.level)
        .max()
        .unwrap_or(RiskLevel::None);

    let overall_score = results
        .iter()
        .filter_map(|r| r.risk.as_ref())
        .map(|r| r.numeric)
        .max()
        .unwrap_or(0);

    let failed_checkers = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.checker_id.to_string())
        .collect();

    let messages = results
        .iter()
        .filter_map(|r| r.risk.as_ref())
        .filter(|risk| risk.level > RiskLevel::None)
        .map(|risk| risk.message.clone())
        .collect();

    let recommendations = results
        .iter()
        .filter_map(|r| r.risk.as_ref())
        .filter(|risk| risk.level > RiskLevel::None)
        .filter_map(|risk| risk.recommendation.clone())
        .collect();

    AuditReport {
        fingerprint: ctx.fingerprint,
        command_type: ctx.command_type,
        raw_sql: ctx.raw_sql.clone(),
        overall_risk,
        overall_score,
        results,
        failed_checkers,
        messages,
        recommendations
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{checkers::RiskScore, dialect::DialectId};

    fn result(id: &'static str, level: RiskLevel) -> CheckerResult {
        CheckerResult::ok(id, RiskScore::new(level, 50, "finding"), Duration::from_millis(1))
    }

    fn result_with_score(id: &'static str, level: RiskLevel, numeric: u8) -> CheckerResult {
        CheckerResult::ok(id, RiskScore::new(level, numeric, "finding"), Duration::from_millis(1))
    }

    #[test]
    fn overall_risk_is_the_maximum() {
        let ctx = SqlContext::parse("SELECT 1", DialectId::Generic);
        let report = aggregate(&ctx, vec![
            result("A", RiskLevel::Low),
            result("B", RiskLevel::Critical),
            result("C", RiskLevel::Medium),
        ]);
        assert_eq!(report.overall_risk, RiskLevel::Critical);
    }

    #[test]
    fn clean_report_has_no_findings() {
        let ctx = SqlContext::parse("SELECT 1", DialectId::Generic);
        let report = aggregate(&ctx, vec![result("A", RiskLevel::None)]);
        assert!(report.is_clean());
    }

    #[test]
    fn results_are_sorted_by_checker_id() {
        let ctx = SqlContext::parse("SELECT 1", DialectId::Generic);
        let report = aggregate(&ctx, vec![
            result("Zeta", RiskLevel::Low),
            result("Alpha", RiskLevel::Low),
        ]);
        assert_eq!(report.results[0].checker_id, "Alpha");
    }

    #[test]
    fn failed_checkers_are_tracked_separately_from_risk() {
        let ctx = SqlContext::parse("SELECT 1", DialectId::Generic);
        let failed = CheckerResult::failed("Broken", "boom", Duration::from_millis(1));
        let report = aggregate(&ctx, vec![failed]);
        assert!(report.is_clean());
        assert_eq!(report.failed_checkers, vec!["Broken".to_string()]);
    }

    #[test]
    fn overall_score_tracks_the_highest_numeric_finding() {
        let ctx = SqlContext::parse("SELECT 1", DialectId::Generic);
        let report = aggregate(&ctx, vec![
            result_with_score("A", RiskLevel::Low, 20),
            result_with_score("B", RiskLevel::High, 70),
            result_with_score("C", RiskLevel::High, 65),
        ]);
        assert_eq!(report.overall_score, 70);
    }

    #[test]
    fn messages_concatenate_every_non_none_finding() {
        let ctx = SqlContext::parse("SELECT 1", DialectId::Generic);
        let report = aggregate(&ctx, vec![
            result("A", RiskLevel::None),
            result("B", RiskLevel::Medium),
        ]);
        assert_eq!(report.messages, vec!["finding".to_string()]);
    }
}
