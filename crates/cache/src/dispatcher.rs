//! Routing of metric names to the policies that consume them.
//!
//! Routes are an ordered list of `(pattern, policy)` pairs and the first
//! pattern matching the start of a metric name wins. Unmatched metrics fall
//! back to [`NoopPolicy`]; they are still tracked and persisted.

use metasync_config::{Config, PolicyConfig, PolicyKind};
use metasync_core::{Error, Result};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Consumer of a metric, activated once when the metric is first created
pub trait MetricPolicy: Send + Sync {
    fn add_metric(&self, name: &str);
    fn start(&self);
}

/// Policy for metrics nobody asked for
#[derive(Debug, Default)]
pub struct NoopPolicy;

impl MetricPolicy for NoopPolicy {
    fn add_metric(&self, _name: &str) {}
    fn start(&self) {}
}

/// Policy that records the metrics routed to it and logs their activation
#[derive(Debug)]
pub struct LoggingPolicy {
    pattern: String,
    config: PolicyConfig,
    metrics: Mutex<Vec<String>>,
    started: AtomicBool,
}

impl LoggingPolicy {
    pub fn new(pattern: impl Into<String>, config: PolicyConfig) -> Self {
        Self {
            pattern: pattern.into(),
            config,
            metrics: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    pub fn metrics(&self) -> Vec<String> {
        self.metrics.lock().clone()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

impl MetricPolicy for LoggingPolicy {
    fn add_metric(&self, name: &str) {
        self.metrics.lock().push(name.to_string());
        tracing::info!(
            metric = %name,
            pattern = %self.pattern,
            options = self.config.options.len(),
            "metric attached to policy"
        );
    }

    fn start(&self) {
        if !self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!(pattern = %self.pattern, "policy started");
        }
    }
}

/// Result of resolving a metric name
pub enum PolicyMatch<'a> {
    Matched {
        pattern: &'a str,
        policy: &'a Arc<dyn MetricPolicy>,
    },
    Unmatched,
}

struct Route {
    source: String,
    pattern: Regex,
    policy: Arc<dyn MetricPolicy>,
}

/// Ordered first-match-wins policy routes
pub struct Dispatcher {
    routes: Vec<Route>,
    fallback: Arc<dyn MetricPolicy>,
    activated: Mutex<HashSet<String>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// A dispatcher with no routes; every metric gets the no-op policy
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            fallback: Arc::new(NoopPolicy),
            activated: Mutex::new(HashSet::new()),
        }
    }

    /// Append a route. Patterns are anchored at the start of the metric name.
    pub fn route(mut self, pattern: &str, policy: Arc<dyn MetricPolicy>) -> Result<Self> {
        let anchored = Regex::new(&format!("^(?:{pattern})")).map_err(|e| {
            Error::configuration(format!("invalid metric pattern '{pattern}': {e}"))
        })?;
        self.routes.push(Route {
            source: pattern.to_string(),
            pattern: anchored,
            policy,
        });
        Ok(self)
    }

    /// Build routes from the configured pattern sets, in declaration order
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut dispatcher = Self::new();
        for (pattern, policy_config) in config.policy_patterns() {
            let policy: Arc<dyn MetricPolicy> = match policy_config.policy {
                PolicyKind::Log => Arc::new(LoggingPolicy::new(pattern, policy_config.clone())),
                PolicyKind::Noop => Arc::new(NoopPolicy),
            };
            dispatcher = dispatcher.route(pattern, policy)?;
        }
        Ok(dispatcher)
    }

    pub fn resolve(&self, name: &str) -> PolicyMatch<'_> {
        self.routes
            .iter()
            .find(|route| route.pattern.is_match(name))
            .map_or(PolicyMatch::Unmatched, |route| PolicyMatch::Matched {
                pattern: &route.source,
                policy: &route.policy,
            })
    }

    /// The policy for `name`, falling back to the no-op policy
    pub fn policy_for(&self, name: &str) -> Arc<dyn MetricPolicy> {
        match self.resolve(name) {
            PolicyMatch::Matched { policy, .. } => Arc::clone(policy),
            PolicyMatch::Unmatched => {
                tracing::warn!(metric = %name, "metric has no matching configuration");
                Arc::clone(&self.fallback)
            }
        }
    }

    /// Attach `name` to its policy and start it, once per metric.
    /// Returns whether this call did the activation.
    pub fn activate(&self, name: &str) -> bool {
        if !self.activated.lock().insert(name.to_string()) {
            return false;
        }
        let policy = self.policy_for(name);
        policy.add_metric(name);
        policy.start();
        true
    }

    pub fn is_activated(&self, name: &str) -> bool {
        self.activated.lock().contains(name)
    }

    /// Drop the activation record so a re-created metric is activated again
    pub fn forget(&self, name: &str) {
        self.activated.lock().remove(name);
    }
}
