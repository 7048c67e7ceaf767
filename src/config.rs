//! Configuration loading and management.
//!
//! The on-disk shape (`FileConfig`) is deserialization-friendly and mutable;
//! it is loaded once at startup (or on an explicit reload) and frozen into a
//! [`RuntimeConfig`] snapshot that checkers receive by `Arc`. Checkers never
//! see the mutable file-shaped config, matching the Design Note in
//! `SPEC_FULL.md` §9 ("avoid exposing mutable config objects to checkers").
//!
//! # Configuration File Format
//!
//! ```yaml
//! enabled: true
//! activeStrategy: default
//! rules:
//!   NoWhereClause:
//!     enabled: true
//!     riskLevel: CRITICAL
//!   DeepPagination:
//!     enabled: true
//!     threshold: 10000
//!   BlacklistOnly:
//!     enabled: true
//!     columns: [deleted, status]
//! retry:
//!   max_retries: 3
//!   initial_delay_ms: 1000
//!   max_delay_ms: 30000
//!   backoff_factor: 2.0
//! ```
//!
//! Unknown top-level keys and unknown `rules.<id>` keys are ignored with a
//! `tracing::warn!`; missing sections fall back to the defaults documented
//! per checker in [`crate::checkers`].

use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{Arc, RwLock}
};

use serde::Deserialize;

use crate::{
    checkers::RiskLevel,
    error::{AppResult, config_error}
};

const KNOWN_TOP_LEVEL_KEYS: &[&str] = &["enabled", "activeStrategy", "rules", "retry"];
const KNOWN_RULE_KEYS: &[&str] = &["enabled", "riskLevel"];

/// On-disk, deserialization-friendly configuration shape.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default = "default_true")]
    pub enabled:         bool,
    #[serde(default = "default_strategy")]
    pub active_strategy: String,
    #[serde(default)]
    pub rules:           HashMap<String, FileCheckerConfig>,
    #[serde(default)]
    pub retry:           RetryConfig
}

fn default_true() -> bool {
    true
}

fn default_strategy() -> String {
    "default".to_string()
}

/// Per-checker on-disk record: enabled flag, severity override, and a bag of
/// typed thresholds. Scalar thresholds (e.g. `threshold: 10000`) and list
/// thresholds (e.g. `columns: [deleted, status]`) are both accepted; the
/// checker reads back only the keys it understands.
#[derive(Debug, Clone, Default)]
pub struct FileCheckerConfig {
    pub enabled:    bool,
    pub risk_level: Option<String>,
    pub fields:     HashMap<String, serde_yaml::Value>
}

impl<'de> Deserialize<'de> for FileCheckerConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>
    {
        let mut map: HashMap<String, serde_yaml::Value> = HashMap::deserialize(deserializer)?;
        let enabled = map
            .remove("enabled")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let risk_level = map
            .remove("riskLevel")
            .and_then(|v| v.as_str().map(str::to_string));
        for key in map.keys() {
            if !KNOWN_RULE_KEYS.contains(&key.as_str()) {
                // threshold/column fields are checker-specific, not a fixed
                // schema; only warn for keys that look like typos of the two
                // reserved control keys.
                let lower = key.to_lowercase();
                if lower == "enable" || lower == "risklevel" || lower == "severity" {
                    tracing::warn!(key, "unrecognized checker config key, ignoring");
                }
            }
        }
        Ok(Self {
            enabled,
            risk_level,
            fields: map
        })
    }
}

impl FileCheckerConfig {
    pub fn threshold_u64(&self, key: &str) -> Option<u64> {
        self.fields.get(key).and_then(|v| v.as_u64())
    }

    pub fn threshold_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(|v| v.as_f64())
    }

    pub fn columns(&self, key: &str) -> Vec<String> {
        self.fields
            .get(key)
            .and_then(|v| v.as_sequence())
            .map(|seq| {
                seq.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Retry configuration for transient persistence failures (spec.md §4.7).
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries:      u32,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms:     u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor:   f64
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries:      default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms:     default_max_delay(),
            backoff_factor:   default_backoff_factor()
        }
    }
}

impl FileConfig {
    /// Parse configuration from a YAML string, warning on unknown top-level
    /// keys but never failing because of them.
    pub fn parse(yaml: &str) -> AppResult<Self> {
        let raw: serde_yaml::Value =
            serde_yaml::from_str(yaml).map_err(|e| config_error(format!("invalid config: {}", e)))?;
        if let serde_yaml::Value::Mapping(map) = &raw {
            for key in map.keys() {
                if let Some(key) = key.as_str()
                    && !KNOWN_TOP_LEVEL_KEYS.contains(&key)
                {
                    tracing::warn!(key, "unrecognized top-level config key, ignoring");
                }
            }
        }
        serde_yaml::from_value(raw).map_err(|e| config_error(format!("invalid config: {}", e)))
    }

    /// Load configuration from a YAML file on disk.
    pub fn load_from_path(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| config_error(format!("failed to read config file '{}': {}", path.display(), e)))?;
        Self::parse(&content)
    }
}

/// Immutable, per-checker runtime record: the shape every [`crate::checkers::Checker`]
/// actually reads.
#[derive(Debug, Clone, Default)]
pub struct CheckerConfig {
    pub enabled:           bool,
    pub severity_override: Option<RiskLevel>,
    pub file:              FileCheckerConfig
}

/// Immutable runtime configuration snapshot handed to the orchestrator and
/// every checker. Never mutated in place; reload produces a new instance.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub enabled:         bool,
    pub active_strategy: String,
    pub retry:           RetryConfig,
    checkers:             HashMap<String, CheckerConfig>
}

impl RuntimeConfig {
    pub fn from_file(file: FileConfig) -> Self {
        let mut checkers = HashMap::with_capacity(file.rules.len());
        for (id, cfg) in file.rules {
            let severity_override = cfg
                .risk_level
                .as_deref()
                .and_then(RiskLevel::parse_name);
            checkers.insert(
                id,
                CheckerConfig {
                    enabled: cfg.enabled,
                    severity_override,
                    file: cfg
                }
            );
        }
        Self {
            enabled: file.enabled,
            active_strategy: file.active_strategy,
            retry: file.retry,
            checkers
        }
    }

    /// Look up a checker's config record, defaulting to "enabled, no
    /// overrides" when the file omitted it.
    pub fn checker(&self, checker_id: &str) -> CheckerConfig {
        self.checkers.get(checker_id).cloned().unwrap_or_else(|| CheckerConfig {
            enabled: true,
            ..Default::default()
        })
    }

    pub fn is_checker_enabled(&self, checker_id: &str) -> bool {
        self.checker(checker_id).enabled
    }
}

/// Hot-reloadable handle around a [`RuntimeConfig`] snapshot.
///
/// Reload swaps the inner `Arc` atomically under a short-held write lock;
/// readers clone the `Arc` under a read lock so an in-flight audit always
/// observes one consistent snapshot, never a mix (spec.md §5).
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<RuntimeConfig>>>
}

impl ConfigHandle {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config)))
        }
    }

    /// Load from a YAML file, constructing a fatal [`AppError`] on failure
    /// (spec.md §7, category 7: config load errors are fatal at startup).
    pub fn load(path: &Path) -> AppResult<Self> {
        let file = FileConfig::load_from_path(path)?;
        Ok(Self::new(RuntimeConfig::from_file(file)))
    }

    pub fn current(&self) -> Arc<RuntimeConfig> {
        self.inner.read().expect("config lock poisoned").clone()
    }

    pub fn reload(&self, config: RuntimeConfig) {
        *self.inner.write().expect("config lock poisoned") = Arc::new(config);
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}
