//! In-memory store implementation.
//!
//! [`MemoryStore`] keeps a single [`Database`] behind a mutex. It is what the
//! tests run against, so it also carries fault injection: the store can be
//! made unreachable, reads can be slowed down or made to fail, and upcoming
//! conditional updates can be made to lose a race against a simulated peer.

use crate::backend::{
    Collection, InsertOutcome, MetaStore, PurgeReport, SiblingRecord, UpdateOutcome,
};
use crate::document::Database;
use async_trait::async_trait;
use metasync_core::{AggregateFields, Error, MetaRecord, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Process-local store
#[derive(Debug)]
pub struct MemoryStore {
    database: Mutex<Database>,
    available: AtomicBool,
    pending_conflicts: AtomicU32,
    pending_read_failures: AtomicU32,
    read_delay: Mutex<Duration>,
    stats: Counters,
}

#[derive(Debug, Default)]
struct Counters {
    reads: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    conflicts: AtomicU64,
}

/// Snapshot of operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub reads: u64,
    pub inserts: u64,
    /// Successful conditional updates
    pub updates: u64,
    /// Conditional updates that matched no record
    pub conflicts: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            database: Mutex::new(Database::default()),
            available: AtomicBool::new(true),
            pending_conflicts: AtomicU32::new(0),
            pending_read_failures: AtomicU32::new(0),
            read_delay: Mutex::new(Duration::ZERO),
            stats: Counters::default(),
        }
    }

    /// Make every operation fail with a transient error while `false`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make the next `count` conditional updates lose to a simulated peer:
    /// the stored version is bumped just before the update is evaluated
    pub fn inject_conflicts(&self, count: u32) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    /// Make every read sleep for `delay` before touching the database.
    /// `Duration::ZERO` turns the delay off.
    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock() = delay;
    }

    /// Make the next `count` reads fail with a transient error, after any
    /// read delay has elapsed
    pub fn fail_reads(&self, count: u32) {
        self.pending_read_failures.store(count, Ordering::SeqCst);
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            reads: self.stats.reads.load(Ordering::Relaxed),
            inserts: self.stats.inserts.load(Ordering::Relaxed),
            updates: self.stats.updates.load(Ordering::Relaxed),
            conflicts: self.stats.conflicts.load(Ordering::Relaxed),
        }
    }

    fn check_available(&self, operation: &str) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::store_unavailable(operation, "memory store marked unavailable"))
        }
    }

    fn take_injected_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn take_injected_read_failure(&self) -> bool {
        self.pending_read_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl MetaStore for MemoryStore {
    async fn read(&self, id: &str) -> Result<Option<MetaRecord>> {
        let fail = self.take_injected_read_failure();
        let delay = *self.read_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(Error::store_unavailable("read", "injected read failure"));
        }
        self.check_available("read")?;
        self.stats.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.database.lock().read(id))
    }

    async fn insert(&self, record: &MetaRecord) -> Result<InsertOutcome> {
        self.check_available("insert")?;
        let outcome = self.database.lock().insert(record);
        if outcome == InsertOutcome::Inserted {
            self.stats.inserts.fetch_add(1, Ordering::Relaxed);
        }
        Ok(outcome)
    }

    async fn conditional_update(
        &self,
        id: &str,
        expected_version: u64,
        fields: &AggregateFields,
    ) -> Result<UpdateOutcome> {
        self.check_available("conditional update")?;
        let mut database = self.database.lock();

        if self.take_injected_conflict() {
            if let Some(stored) = database.meta.get_mut(id) {
                stored.version += 1;
            }
        }

        let outcome = database.conditional_update(id, expected_version, fields);
        if outcome.updated_existing {
            self.stats.updates.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.conflicts.fetch_add(1, Ordering::Relaxed);
        }
        Ok(outcome)
    }

    async fn scan(&self) -> Result<Vec<MetaRecord>> {
        self.check_available("scan")?;
        Ok(self.database.lock().scan())
    }

    async fn insert_sibling(&self, collection: Collection, record: SiblingRecord) -> Result<()> {
        self.check_available("insert sibling")?;
        self.database.lock().insert_sibling(collection, record);
        Ok(())
    }

    async fn count_siblings(&self, metric: &str) -> Result<usize> {
        self.check_available("count siblings")?;
        Ok(self.database.lock().count_siblings(metric))
    }

    async fn purge_metric(&self, metric: &str) -> Result<PurgeReport> {
        self.check_available("purge metric")?;
        Ok(self.database.lock().purge_metric(metric))
    }
}
