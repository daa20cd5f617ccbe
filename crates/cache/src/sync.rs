//! Optimistic concurrency synchronization of one aggregate with the store.
//!
//! The store is normally written by a single owner per metric, but a peer
//! process or an earlier incarnation of this one may have left a newer
//! record behind. Every sync therefore reads the remote record first, merges
//! it into the local aggregate, and commits with a conditional update keyed
//! on the version it read. Losing that race is retried with backoff until
//! the write lands; store failures are returned to the caller.

use metasync_core::{MetricAggregate, Result};
use metasync_store::{InsertOutcome, MetaStore};
use metasync_utils::RetryConfig;
use std::sync::Arc;

/// Outcome of a successful sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Version the store now holds
    pub version: u64,
    /// Conditional updates lost to concurrent writers before this one won
    pub conflicts: u32,
    /// Whether this sync inserted the initial record
    pub created: bool,
}

/// Performs the read-merge-conditional-write cycle against a store
pub struct SyncEngine {
    store: Arc<dyn MetaStore>,
    backoff: RetryConfig,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn MetaStore>, backoff: RetryConfig) -> Self {
        Self { store, backoff }
    }

    pub fn store(&self) -> &Arc<dyn MetaStore> {
        &self.store
    }

    /// Persist `aggregate`, merging any newer remote state into it.
    ///
    /// The caller must hold the aggregate's lock for the whole call. On
    /// success the aggregate carries the committed version.
    #[tracing::instrument(level = "debug", skip_all, fields(metric = %aggregate.id))]
    pub async fn synchronize(&self, aggregate: &mut MetricAggregate) -> Result<SyncReport> {
        let mut conflicts = 0u32;
        let mut created = false;

        loop {
            match self.store.read(&aggregate.id).await? {
                None => match self.store.insert(aggregate).await? {
                    InsertOutcome::Inserted => {
                        tracing::debug!(version = aggregate.version, "inserted initial record");
                        created = true;
                    }
                    InsertOutcome::AlreadyExists => {
                        tracing::debug!("record appeared concurrently, reading it back");
                        continue;
                    }
                },
                Some(remote) => {
                    tracing::trace!(
                        remote_version = remote.version,
                        remote_count = remote.count,
                        "merging remote record"
                    );
                    aggregate.merge_remote(&remote);
                }
            }

            let expected_version = aggregate.version;
            let fields = aggregate.fields();
            let outcome = self
                .store
                .conditional_update(&aggregate.id, expected_version, &fields)
                .await?;

            if outcome.updated_existing {
                aggregate.apply_update(&fields);
                tracing::debug!(
                    version = aggregate.version,
                    count = aggregate.count,
                    conflicts,
                    "metadata committed"
                );
                return Ok(SyncReport {
                    version: aggregate.version,
                    conflicts,
                    created,
                });
            }

            let delay = self.backoff.calculate_delay(conflicts);
            conflicts = conflicts.saturating_add(1);
            tracing::error!(
                metric = %aggregate.id,
                expected_version,
                attempt = conflicts,
                delay_ms = delay.as_millis() as u64,
                "metadata version changed by another writer, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
