//! Aggregate metadata tracked for every metric

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};

/// Running summary of every value observed for one metric.
///
/// The same shape is kept in memory and persisted to the shared store. The
/// `version` field is the optimistic concurrency token: it starts at 0 and
/// the store increments it by exactly one on every successful conditional
/// update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAggregate {
    /// Metric name, unique per store
    pub id: String,
    /// Version token of the last persisted write this aggregate was reconciled with
    pub version: u64,
    /// Smallest value observed
    pub min: f64,
    /// Largest value observed
    pub max: f64,
    /// Number of observations folded in
    pub count: u64,
}

/// Persisted form of an aggregate
pub type MetaRecord = MetricAggregate;

/// Fields written by a conditional update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateFields {
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

impl MetricAggregate {
    /// Create the aggregate for the first observation of a metric
    #[must_use]
    pub fn new(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            version: 0,
            min: value,
            max: value,
            count: 1,
        }
    }

    /// Fold another observation into the summary
    pub fn observe(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
    }

    /// Reconcile with the record currently held by the store.
    ///
    /// The remote version becomes the new baseline. Bounds widen to cover both
    /// sides and the count takes the larger of the two: both sides hold
    /// cumulative totals, so summing would double count.
    pub fn merge_remote(&mut self, remote: &MetaRecord) {
        self.version = remote.version;
        self.min = self.min.min(remote.min);
        self.max = self.max.max(remote.max);
        self.count = self.count.max(remote.count);
    }

    /// The mutable fields sent with a conditional update
    #[must_use]
    pub fn fields(&self) -> AggregateFields {
        AggregateFields {
            min: self.min,
            max: self.max,
            count: self.count,
        }
    }

    /// Apply fields from a successful conditional update, bumping the version
    pub fn apply_update(&mut self, fields: &AggregateFields) {
        self.min = fields.min;
        self.max = fields.max;
        self.count = fields.count;
        self.version += 1;
    }
}

/// Reject observations that would break the aggregate invariants
pub fn validate_observation(metric: &str, value: f64) -> Result<()> {
    if metric.trim().is_empty() {
        return Err(Error::invalid_observation(metric, "metric name is empty"));
    }
    if !value.is_finite() {
        return Err(Error::invalid_observation(
            metric,
            format!("value {value} is not finite"),
        ));
    }
    Ok(())
}
