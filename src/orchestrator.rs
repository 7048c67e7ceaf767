//! Audit Orchestrator (spec.md §4.5, component E).
//!
//! Builds one [`SqlContext`] per event (applying the rewrite chain first, if
//! configured), fans the enabled checkers out across the tokio runtime, and
//! aggregates the results. Every field on [`Orchestrator`] is `Arc`-shared or
//! `Copy`, so it holds no mutable state between invocations and is safe to
//! call from many tasks concurrently (spec.md §4.5's explicit requirement).
//!
//! Persistence is deliberately not this module's job: `crate::stream` wraps
//! the call to `Store::append` in the retry/dead-letter ladder (spec.md
//! §4.7), which keeps the orchestrator reusable from the static scan path
//! too, where there is no stream, no retry, and no dead-letter topic.

use std::{sync::Arc, time::Duration};

use crate::{
    aggregator::{self, AuditReport},
    checkers::{CheckerRegistry, CheckerResult, dispatch_one},
    config::ConfigHandle,
    context::{ExecutionMetadata, SqlContext},
    dialect::{DialectId, to_parser_dialect},
    error::{AppResult, rewriter_error},
    rewrite::RewriteChain
};

/// Default per-checker wall-clock budget (spec.md §4.5 step 3).
pub const DEFAULT_CHECKER_DEADLINE: Duration = Duration::from_millis(200);

/// Fan-out dispatcher for one SQL statement against the enabled checker set.
pub struct Orchestrator {
    registry:         Arc<CheckerRegistry>,
    config:           ConfigHandle,
    rewriters:        RewriteChain,
    checker_deadline: Duration
}

impl Orchestrator {
    pub fn new(registry: Arc<CheckerRegistry>, config: ConfigHandle) -> Self {
        Self {
            registry,
            config,
            rewriters: RewriteChain::default(),
            checker_deadline: DEFAULT_CHECKER_DEADLINE
        }
    }

    pub fn with_rewriters(mut self, rewriters: RewriteChain) -> Self {
        self.rewriters = rewriters;
        self
    }

    pub fn with_checker_deadline(mut self, deadline: Duration) -> Self {
        self.checker_deadline = deadline;
        self
    }

    /// Apply the rewrite chain (if any) and build the context the checkers
    /// will see. A rewriter failure aborts the event (spec.md §7, error
    /// category 4): the caller should dead-letter without retrying, since a
    /// rewriter bug is not a transient condition.
    pub fn build_context(&self, raw_sql: &str, dialect: DialectId) -> AppResult<SqlContext> {
        if self.rewriters.is_empty() {
            return Ok(SqlContext::parse(raw_sql, dialect));
        }
        let parser_dialect = to_parser_dialect(dialect).into_parser_dialect();
        let mut statements = sqlparser::parser::Parser::parse_sql(parser_dialect.as_ref(), raw_sql)
            .map_err(|e| rewriter_error("parse", e.to_string()))?;
        if statements.is_empty() {
            return Err(rewriter_error("parse", "no statement to rewrite"));
        }
        let rewritten = self.rewriters.apply(statements.remove(0))?;
        Ok(SqlContext::parse(&rewritten.to_string(), dialect))
    }

    /// Build a context, dispatch every enabled checker, and aggregate.
    /// Convenience wrapper around [`Self::build_context`] + [`Self::dispatch`]
    /// for the common one-event-in, one-report-out call shape.
    pub async fn audit(
        &self,
        raw_sql: &str,
        dialect: DialectId,
        execution: Option<ExecutionMetadata>
    ) -> AppResult<AuditReport> {
        let mut ctx = self.build_context(raw_sql, dialect)?;
        if let Some(execution) = execution {
            ctx = ctx.with_execution(execution);
        }
        Ok(self.dispatch(&ctx).await)
    }

    /// Dispatch every enabled checker against `ctx` as an independent tokio
    /// task, each bounded by the configured per-checker deadline, then
    /// aggregate. A checker that exceeds its deadline yields a timeout
    /// result without being cancelled — per spec.md §4.5 step 4, the
    /// runaway task is left to finish in the background and its result is
    /// discarded, since aborting arbitrary user-supplied logic mid-flight is
    /// not a safety requirement here.
    pub async fn dispatch(&self, ctx: &SqlContext) -> AuditReport {
        let config = self.config.current();
        let deadline = self.checker_deadline;

        let mut pending = Vec::new();
        for (idx, checker) in self.registry.checkers().iter().enumerate() {
            if !config.is_checker_enabled(checker.id()) {
                continue;
            }
            let registry = Arc::clone(&self.registry);
            let config = Arc::clone(&config);
            let ctx = ctx.clone();
            let checker_id = checker.id();
            let task = tokio::spawn(async move {
                let checker = &registry.checkers()[idx];
                let cfg = config.checker(checker.id());
                dispatch_one(checker.as_ref(), &ctx, &cfg)
            });
            pending.push((checker_id, task));
        }

        let mut results = Vec::with_capacity(pending.len());
        for (checker_id, task) in pending {
            let outcome = match tokio::time::timeout(deadline, task).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => CheckerResult::failed(checker_id, "checker task panicked", deadline),
                Err(_) => CheckerResult::timeout(checker_id, deadline)
            };
            results.push(outcome);
        }

        aggregator::aggregate(ctx, results)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{checkers::{CheckerCategory, CheckerInfo, RiskLevel, RiskScore}, config::{CheckerConfig, RuntimeConfig}};

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(Arc::new(CheckerRegistry::standard()), ConfigHandle::new(RuntimeConfig::default()))
    }

    #[tokio::test]
    async fn dispatch_flags_missing_where_on_delete() {
        let ctx = SqlContext::parse("DELETE FROM users", DialectId::Generic);
        let report = orchestrator().dispatch(&ctx).await;
        assert_eq!(report.overall_risk, RiskLevel::Critical);
    }

    #[tokio::test]
    async fn audit_applies_rewrite_chain_before_checking() {
        let chain = RewriteChain::new(vec![Box::new(crate::rewrite::TenantFilter {
            column: "tenant_id".to_string(),
            value:  sqlparser::ast::Expr::value(sqlparser::ast::Value::Number("1".to_string(), false))
        })]);
        let orchestrator = Orchestrator::new(Arc::new(CheckerRegistry::standard()), ConfigHandle::default())
            .with_rewriters(chain);
        let report = orchestrator.audit("SELECT * FROM orders", DialectId::Generic, None).await.unwrap();
        assert!(report.raw_sql.to_lowercase().contains("tenant_id"));
    }

    struct SlowChecker;

    impl crate::checkers::Checker for SlowChecker {
        fn info(&self) -> CheckerInfo {
            CheckerInfo {
                id:            "SlowChecker",
                name:          "slow checker",
                default_level: RiskLevel::Low,
                category:      CheckerCategory::Policy
            }
        }

        fn check(&self, _ctx: &SqlContext, _config: &CheckerConfig) -> RiskScore {
            std::thread::sleep(Duration::from_millis(50));
            RiskScore::new(RiskLevel::Low, 10, "slow")
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn checker_exceeding_deadline_yields_timeout_result() {
        let registry = Arc::new(CheckerRegistry::from_checkers(vec![Box::new(SlowChecker)]));
        let orchestrator =
            Orchestrator::new(registry, ConfigHandle::default()).with_checker_deadline(Duration::from_millis(1));
        let ctx = SqlContext::parse("SELECT 1", DialectId::Generic);
        let report = orchestrator.dispatch(&ctx).await;
        assert_eq!(report.results.len(), 1);
        assert!(!report.results[0].success);
        assert_eq!(report.results[0].error_message.as_deref(), Some("timeout"));
    }
}
