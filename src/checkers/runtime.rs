//! Runtime-only checkers: rules that need execution metadata the static AST
//! can't provide (spec.md §4.4, §9 Open Question — `ErrorRate`'s rolling
//! window is scoped per [`crate::fingerprint::SqlFingerprint`], not per
//! mapper, so two mappers issuing the same statement shape share one error
//! budget).
//!
//! Both checkers carry mutable state (a rolling window keyed by
//! fingerprint), guarded by a `Mutex` inside the checker instance rather
//! than a process-wide static — each [`super::CheckerRegistry`] gets its
//! own independent windows.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex
};

use super::{CheckerCategory, CheckerInfo, Checker, RiskLevel, RiskScore};
use crate::{config::CheckerConfig, context::SqlContext, fingerprint::SqlFingerprint};

const DEFAULT_SLOW_QUERY_THRESHOLD_MS: f64 = 1_000.0;
const DEFAULT_ERROR_RATE_WINDOW: usize = 50;
const DEFAULT_ERROR_RATE_THRESHOLD: f64 = 0.05;
const MIN_SAMPLES_FOR_ERROR_RATE: usize = 5;

/// Flags queries whose observed execution latency exceeds a threshold.
#[derive(Default)]
pub struct SlowQuery;

impl Checker for SlowQuery {
    fn info(&self) -> CheckerInfo {
        CheckerInfo {
            id:            "SlowQuery",
            name:          "Execution latency exceeds threshold",
            default_level: RiskLevel::Medium,
            category:      CheckerCategory::Runtime
        }
    }

    fn check(&self, ctx: &SqlContext, config: &CheckerConfig) -> RiskScore {
        let Some(latency) = ctx.execution.latency else {
            return RiskScore::none();
        };
        let threshold_ms = config
            .file
            .threshold_f64("thresholdMs")
            .unwrap_or(DEFAULT_SLOW_QUERY_THRESHOLD_MS);
        let observed_ms = latency.as_secs_f64() * 1_000.0;
        if observed_ms <= threshold_ms {
            return RiskScore::none();
        }
        let ratio = observed_ms / threshold_ms;
        let level = if ratio >= 10.0 {
            RiskLevel::Critical
        } else if ratio >= 3.0 {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        };
        RiskScore::new(
            level,
            (ratio * 10.0).min(100.0) as u8,
            format!("observed latency {observed_ms:.1}ms exceeds threshold {threshold_ms:.1}ms")
        )
        .with_recommendation("Add an index on the filtered/joined columns, or add a LIMIT")
        .with_metadata("observedMs", format!("{observed_ms:.1}"))
        .with_metadata("thresholdMs", format!("{threshold_ms:.1}"))
    }
}

/// Flags a SQL shape whose rolling failure rate exceeds a threshold.
pub struct ErrorRate {
    windows: Mutex<HashMap<SqlFingerprint, VecDeque<bool>>>
}

impl Default for ErrorRate {
    fn default() -> Self {
        Self {
            windows: Mutex::new(HashMap::new())
        }
    }
}

impl Checker for ErrorRate {
    fn info(&self) -> CheckerInfo {
        CheckerInfo {
            id:            "ErrorRate",
            name:          "Rolling execution failure rate exceeds threshold",
            default_level: RiskLevel::High,
            category:      CheckerCategory::Runtime
        }
    }

    fn check(&self, ctx: &SqlContext, config: &CheckerConfig) -> RiskScore {
        let Some(succeeded) = ctx.execution.succeeded else {
            return RiskScore::none();
        };
        let window_size = config
            .file
            .threshold_u64("windowSize")
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_ERROR_RATE_WINDOW);
        let threshold = config
            .file
            .threshold_f64("rate")
            .unwrap_or(DEFAULT_ERROR_RATE_THRESHOLD);

        let mut windows = self.windows.lock().expect("error-rate window lock poisoned");
        let window = windows.entry(ctx.fingerprint).or_default();
        window.push_back(succeeded);
        while window.len() > window_size {
            window.pop_front();
        }

        if window.len() < MIN_SAMPLES_FOR_ERROR_RATE {
            return RiskScore::none();
        }
        let failures = window.iter().filter(|ok| !**ok).count();
        let rate = failures as f64 / window.len() as f64;
        if rate <= threshold {
            return RiskScore::none();
        }
        let level = if rate >= 0.5 {
            RiskLevel::Critical
        } else if rate >= 0.2 {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        };
        RiskScore::new(
            level,
            (rate * 100.0) as u8,
            format!(
                "fingerprint {} failed {failures}/{} executions ({:.1}%) over the rolling window",
                ctx.fingerprint,
                window.len(),
                rate * 100.0
            )
        )
        .with_recommendation("Investigate recent failures for this query shape before they compound")
        .with_metadata("failureRate", format!("{:.3}", rate))
        .with_metadata("sampleCount", window.len().to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{context::ExecutionMetadata, dialect::DialectId};

    fn ctx_with_latency(ms: u64) -> SqlContext {
        SqlContext::parse("SELECT * FROM t", DialectId::Generic)
            .with_execution(ExecutionMetadata {
                latency: Some(Duration::from_millis(ms)),
                ..Default::default()
            })
    }

    #[test]
    fn slow_query_ignores_contexts_without_latency() {
        let ctx = SqlContext::parse("SELECT 1", DialectId::Generic);
        let risk = SlowQuery.check(&ctx, &CheckerConfig::default());
        assert_eq!(risk.level, RiskLevel::None);
    }

    #[test]
    fn slow_query_flags_latency_over_threshold() {
        let risk = SlowQuery.check(&ctx_with_latency(5_000), &CheckerConfig::default());
        assert_eq!(risk.level, RiskLevel::High);
    }

    #[test]
    fn slow_query_allows_fast_query() {
        let risk = SlowQuery.check(&ctx_with_latency(10), &CheckerConfig::default());
        assert_eq!(risk.level, RiskLevel::None);
    }

    fn ctx_with_outcome(succeeded: bool) -> SqlContext {
        SqlContext::parse("SELECT * FROM orders WHERE id = 1", DialectId::Generic)
            .with_execution(ExecutionMetadata {
                succeeded: Some(succeeded),
                ..Default::default()
            })
    }

    #[test]
    fn error_rate_requires_minimum_samples() {
        let checker = ErrorRate::default();
        let cfg = CheckerConfig::default();
        for _ in 0..3 {
            let risk = checker.check(&ctx_with_outcome(false), &cfg);
            assert_eq!(risk.level, RiskLevel::None);
        }
    }

    #[test]
    fn error_rate_flags_high_failure_rate() {
        let checker = ErrorRate::default();
        let cfg = CheckerConfig::default();
        let mut last = RiskScore::none();
        for i in 0..10 {
            last = checker.check(&ctx_with_outcome(i % 2 == 0), &cfg);
        }
        assert!(last.level >= RiskLevel::Medium);
    }

    #[test]
    fn error_rate_shares_window_by_fingerprint_not_statement_text() {
        let checker = ErrorRate::default();
        let cfg = CheckerConfig::default();
        for _ in 0..5 {
            checker.check(
                &SqlContext::parse("SELECT * FROM orders WHERE id = 1", DialectId::Generic)
                    .with_execution(ExecutionMetadata {
                        succeeded: Some(false),
                        ..Default::default()
                    }),
                &cfg
            );
        }
        let last = checker.check(
            &SqlContext::parse("SELECT * FROM orders WHERE id = 999", DialectId::Generic)
                .with_execution(ExecutionMetadata {
                    succeeded: Some(false),
                    ..Default::default()
                }),
            &cfg
        );
        assert!(last.level >= RiskLevel::Medium);
    }
}
