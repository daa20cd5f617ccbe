//! Centralized configuration for metasync
//!
//! `Config` is immutable after loading and is shared by the store, the
//! metadata service, and the dispatcher.

use indexmap::IndexMap;
use metasync_core::{
    Error, Result, DEFAULT_BASE_DELAY_MS, DEFAULT_DATABASE_NAME, DEFAULT_DRAIN_ATTEMPTS,
    DEFAULT_JITTER_FACTOR, DEFAULT_MAX_DELAY_MS, DEFAULT_REFRESH_INTERVAL_SECS,
    DEFAULT_STORE_FILENAME,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shared store location
    pub store: StoreConfig,
    /// Aggregate metadata settings
    pub metric_meta: MetricMetaConfig,
    /// Backoff for version conflicts and drain retries
    pub retry: RetrySettings,
    /// Ordered pattern -> policy sets; earlier entries win
    pub metrics: Vec<IndexMap<String, PolicyConfig>>,
}

/// Store connection and database selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// File backing the shared store
    pub path: PathBuf,
    /// Logical database inside the store
    pub database_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_FILENAME),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
        }
    }
}

/// Settings for the aggregate metadata engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricMetaConfig {
    /// Debounce delay in seconds
    pub refresh_interval: u64,
}

impl Default for MetricMetaConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

/// Backoff settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Randomization applied to each delay (0.0 to 1.0)
    pub jitter_factor: f64,
    /// Attempts per metric during a drain before it is given up
    pub drain_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_factor: DEFAULT_JITTER_FACTOR,
            drain_attempts: DEFAULT_DRAIN_ATTEMPTS,
        }
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Which policy consumes a matched metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Log activation of every matched metric
    #[default]
    Log,
    /// Track the metric without any consumer
    Noop,
}

/// Policy configuration attached to a metric name pattern
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub policy: PolicyKind,
    /// Policy specific settings, passed through untouched
    #[serde(default, flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl Config {
    /// Parse a configuration document
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::serialization("configuration file", e))
    }

    /// Debounce delay between a metric becoming dirty and its flush
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.metric_meta.refresh_interval)
    }

    /// Patterns in declaration order, flattened across every metric set
    pub fn policy_patterns(&self) -> impl Iterator<Item = (&str, &PolicyConfig)> {
        self.metrics
            .iter()
            .flat_map(|set| set.iter().map(|(pattern, conf)| (pattern.as_str(), conf)))
    }

    /// Check values that deserialize fine but cannot be used
    pub fn validate(&self) -> Result<()> {
        for (pattern, _) in self.policy_patterns() {
            if let Err(e) = Regex::new(pattern) {
                return Err(Error::configuration(format!(
                    "invalid metric pattern '{pattern}': {e}"
                )));
            }
        }

        if self.retry.drain_attempts == 0 {
            return Err(Error::configuration("retry.drain_attempts must be at least 1"));
        }

        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(Error::configuration(format!(
                "retry.jitter_factor must be between 0.0 and 1.0, got {}",
                self.retry.jitter_factor
            )));
        }

        if self.store.database_name.trim().is_empty() {
            return Err(Error::configuration("store.database_name must not be empty"));
        }

        Ok(())
    }
}
