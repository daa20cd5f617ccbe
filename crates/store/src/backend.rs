//! Store contract for aggregate metadata.
//!
//! The synchronization engine only relies on three primitives: read a record
//! by key, insert a record if absent, and a conditional update keyed on the
//! record's version. The conditional update is what replaces locking: a
//! writer that read version `n` can only commit if the stored version is
//! still `n`, and a successful commit moves it to `n + 1`.
//!
//! Stores also own the records sibling subsystems derive from a metric
//! (raw observations, analysis windows) so an administrative delete can
//! remove every trace of a metric in one call.

use async_trait::async_trait;
use metasync_core::{AggregateFields, MetaRecord, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A record with the same id was already present; nothing was written
    AlreadyExists,
}

/// Result of a conditional update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// `false` when no record matched the id and expected version
    pub updated_existing: bool,
}

/// Collections owned by subsystems that consume a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// Raw metric observations
    Observations,
    /// Derived analysis windows
    Windows,
}

/// A record held by a sibling subsystem, tied to a metric by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiblingRecord {
    pub metric: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl SiblingRecord {
    pub fn new(metric: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            metric: metric.into(),
            payload,
        }
    }
}

/// What an administrative purge removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub meta_removed: bool,
    pub observations_removed: usize,
    pub windows_removed: usize,
}

/// Persistent, shared, versioned store of aggregate metadata.
///
/// Implementations must be safe to share across tasks. Every method may fail
/// with a transient error (see [`metasync_core::Error::is_transient`]) when
/// the store is unreachable.
#[async_trait]
pub trait MetaStore: Send + Sync {
    /// Read the metadata record for a metric
    async fn read(&self, id: &str) -> Result<Option<MetaRecord>>;

    /// Insert a record unless one with the same id exists
    async fn insert(&self, record: &MetaRecord) -> Result<InsertOutcome>;

    /// Set `min`, `max`, `count` and increment `version` by one, atomically,
    /// only if the stored version equals `expected_version`
    async fn conditional_update(
        &self,
        id: &str,
        expected_version: u64,
        fields: &AggregateFields,
    ) -> Result<UpdateOutcome>;

    /// Every metadata record in the store
    async fn scan(&self) -> Result<Vec<MetaRecord>>;

    /// Store a record on behalf of a sibling subsystem
    async fn insert_sibling(&self, collection: Collection, record: SiblingRecord) -> Result<()>;

    /// Number of sibling records tied to a metric, across all collections
    async fn count_siblings(&self, metric: &str) -> Result<usize>;

    /// Remove the metadata record and every sibling record of a metric
    async fn purge_metric(&self, metric: &str) -> Result<PurgeReport>;
}

#[async_trait]
impl<T: MetaStore + ?Sized> MetaStore for Arc<T> {
    async fn read(&self, id: &str) -> Result<Option<MetaRecord>> {
        (**self).read(id).await
    }

    async fn insert(&self, record: &MetaRecord) -> Result<InsertOutcome> {
        (**self).insert(record).await
    }

    async fn conditional_update(
        &self,
        id: &str,
        expected_version: u64,
        fields: &AggregateFields,
    ) -> Result<UpdateOutcome> {
        (**self)
            .conditional_update(id, expected_version, fields)
            .await
    }

    async fn scan(&self) -> Result<Vec<MetaRecord>> {
        (**self).scan().await
    }

    async fn insert_sibling(&self, collection: Collection, record: SiblingRecord) -> Result<()> {
        (**self).insert_sibling(collection, record).await
    }

    async fn count_siblings(&self, metric: &str) -> Result<usize> {
        (**self).count_siblings(metric).await
    }

    async fn purge_metric(&self, metric: &str) -> Result<PurgeReport> {
        (**self).purge_metric(metric).await
    }
}
