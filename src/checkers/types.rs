//! Type definitions shared by every checker: [`RiskLevel`], [`RiskScore`],
//! [`CheckerResult`], and [`CheckerInfo`].

use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;

/// Risk level of a checker's finding.
///
/// Ordered from lowest to highest for the aggregator's max-reduction
/// (spec.md §4.6). `None` is distinct from a checker error: it means the
/// checker ran and found nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Default)]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical
}

impl RiskLevel {
    /// Parse a config-file risk level name (`"CRITICAL"`, `"high"`, ...).
    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NONE" => Some(Self::None),
            "LOW" => Some(Self::Low),
            "MEDIUM" => Some(Self::Medium),
            "HIGH" => Some(Self::High),
            "CRITICAL" => Some(Self::Critical),
            _ => None
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL")
        }
    }
}

/// Category of a checker, for grouping and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckerCategory {
    /// Operations that can destroy or expose unbounded data (SEC-style).
    Security,
    /// Pagination and scan-cost issues (PERF-style).
    Performance,
    /// Column-allow/deny-list policy issues.
    Policy,
    /// Checks that require execution metadata, not just the AST.
    Runtime
}

impl std::fmt::Display for CheckerCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Security => write!(f, "Security"),
            Self::Performance => write!(f, "Performance"),
            Self::Policy => write!(f, "Policy"),
            Self::Runtime => write!(f, "Runtime")
        }
    }
}

/// Static metadata about a checker, used for config lookups and display.
#[derive(Debug, Clone)]
pub struct CheckerInfo {
    pub id:            &'static str,
    pub name:          &'static str,
    pub default_level: RiskLevel,
    pub category:      CheckerCategory
}

/// A single checker's finding. `RiskLevel::None` means "ran, found nothing" —
/// distinct from a checker error, which is represented by [`CheckerResult`]
/// having `success = false` instead of a `RiskScore` at all.
#[derive(Debug, Clone, Serialize)]
pub struct RiskScore {
    pub level:          RiskLevel,
    pub numeric:        u8,
    pub message:        String,
    pub recommendation: Option<String>,
    pub metadata:       IndexMap<String, String>
}

impl RiskScore {
    pub fn none() -> Self {
        Self {
            level:          RiskLevel::None,
            numeric:        0,
            message:        String::new(),
            recommendation: None,
            metadata:       IndexMap::new()
        }
    }

    pub fn new(level: RiskLevel, numeric: u8, message: impl Into<String>) -> Self {
        Self {
            level,
            numeric: numeric.min(100),
            message: message.into(),
            recommendation: None,
            metadata: IndexMap::new()
        }
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Outcome of dispatching one checker against one [`crate::context::SqlContext`].
#[derive(Debug, Clone, Serialize)]
pub struct CheckerResult {
    pub checker_id:    &'static str,
    pub success:       bool,
    pub risk:          Option<RiskScore>,
    pub error_message: Option<String>,
    #[serde(rename = "elapsedMs")]
    pub elapsed_ms:    u64
}

impl CheckerResult {
    pub fn ok(checker_id: &'static str, risk: RiskScore, elapsed: Duration) -> Self {
        Self {
            checker_id,
            success: true,
            risk: Some(risk),
            error_message: None,
            elapsed_ms: elapsed.as_millis() as u64
        }
    }

    pub fn failed(checker_id: &'static str, error_message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            checker_id,
            success: false,
            risk: None,
            error_message: Some(error_message.into()),
            elapsed_ms: elapsed.as_millis() as u64
        }
    }

    pub fn timeout(checker_id: &'static str, deadline: Duration) -> Self {
        Self::failed(checker_id, "timeout", deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_ordering_is_monotone() {
        assert!(RiskLevel::None < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn parse_name_is_case_insensitive() {
        assert_eq!(RiskLevel::parse_name("critical"), Some(RiskLevel::Critical));
        assert_eq!(RiskLevel::parse_name("HIGH"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse_name("bogus"), None);
    }
}
