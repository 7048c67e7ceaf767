//! Static and runtime checkers, and the registry that dispatches them
//! (spec.md §4.4, §4.5).
//!
//! Every checker implements [`Checker::check`] as a pure function from one
//! [`SqlContext`] (plus its resolved [`CheckerConfig`]) to one [`RiskScore`].
//! `CheckerRegistry::run_all` fans the full roster out over `rayon` — the
//! static-scan path has no per-checker wall-clock budget; that's the
//! async orchestrator's job (`crate::orchestrator`) for the runtime path,
//! where a slow or hung checker must not stall the whole audit.

mod types;

pub mod pagination;
pub mod policy;
pub mod runtime;
pub mod security;

use std::{panic, time::Instant};

use rayon::prelude::*;
pub use types::{CheckerCategory, CheckerInfo, CheckerResult, RiskLevel, RiskScore};

use crate::{
    config::{CheckerConfig, RuntimeConfig},
    context::SqlContext
};

/// A single audit rule over a [`SqlContext`].
pub trait Checker: Send + Sync {
    fn info(&self) -> CheckerInfo;

    /// Evaluate this checker against one context. Must be pure and total —
    /// "nothing to flag" is `RiskScore::none()`, not a panic or an error.
    fn check(&self, ctx: &SqlContext, config: &CheckerConfig) -> RiskScore;

    fn id(&self) -> &'static str {
        self.info().id
    }
}

/// The full set of checkers wired into the engine.
pub struct CheckerRegistry {
    checkers: Vec<Box<dyn Checker>>
}

impl CheckerRegistry {
    /// The eleven mandatory checkers from spec.md §4.4.
    pub fn standard() -> Self {
        Self {
            checkers: vec![
                Box::new(security::NoWhereClause),
                Box::new(security::DummyCondition),
                Box::new(policy::BlacklistOnly),
                Box::new(policy::WhitelistOnly),
                Box::new(pagination::NoPagination),
                Box::new(pagination::MissingOrderBy),
                Box::new(pagination::DeepPagination),
                Box::new(pagination::LargePageSize),
                Box::new(pagination::NoConditionPagination),
                Box::new(runtime::SlowQuery::default()),
                Box::new(runtime::ErrorRate::default()),
            ]
        }
    }

    /// Build a registry from an arbitrary checker set, bypassing the
    /// standard eleven-checker roster. Used by tests and by callers that
    /// need a narrowed or custom checker pool.
    pub fn from_checkers(checkers: Vec<Box<dyn Checker>>) -> Self {
        Self {
            checkers
        }
    }

    pub fn checkers(&self) -> &[Box<dyn Checker>] {
        &self.checkers
    }

    pub fn find(&self, checker_id: &str) -> Option<&dyn Checker> {
        self.checkers
            .iter()
            .map(AsRef::as_ref)
            .find(|c| c.id() == checker_id)
    }

    /// Run every enabled checker against one context in parallel, applying
    /// config-level enable/disable and severity overrides.
    pub fn run_all(&self, ctx: &SqlContext, runtime_config: &RuntimeConfig) -> Vec<CheckerResult> {
        self.checkers
            .par_iter()
            .filter_map(|checker| {
                let cfg = runtime_config.checker(checker.id());
                if !cfg.enabled {
                    return None;
                }
                Some(dispatch_one(checker.as_ref(), ctx, &cfg))
            })
            .collect()
    }
}

impl Default for CheckerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Run one checker with a panic guard, so a bug in one rule can't take down
/// a batch dispatch of the other ten.
pub fn dispatch_one(checker: &dyn Checker, ctx: &SqlContext, cfg: &CheckerConfig) -> CheckerResult {
    let start = Instant::now();
    let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| checker.check(ctx, cfg)));
    let elapsed = start.elapsed();
    match outcome {
        Ok(mut risk) => {
            if let Some(level) = cfg.severity_override {
                risk.level = level;
            }
            CheckerResult::ok(checker.id(), risk, elapsed)
        }
        Err(_) => CheckerResult::failed(checker.id(), "checker panicked", elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::DialectId;

    #[test]
    fn standard_registry_has_eleven_checkers() {
        assert_eq!(CheckerRegistry::standard().checkers().len(), 11);
    }

    #[test]
    fn run_all_skips_disabled_checkers() {
        let mut file = crate::config::FileConfig::default();
        file.rules.insert(
            "NoWhereClause".to_string(),
            crate::config::FileCheckerConfig {
                enabled: false,
                ..Default::default()
            }
        );
        let runtime = RuntimeConfig::from_file(file);
        let registry = CheckerRegistry::standard();
        let ctx = SqlContext::parse("DELETE FROM users", DialectId::Generic);
        let results = registry.run_all(&ctx, &runtime);
        assert!(!results.iter().any(|r| r.checker_id == "NoWhereClause"));
    }
}
