//! Concurrent map from metric name to its in-memory aggregate.
//!
//! Each aggregate sits behind its own async mutex so that observations and
//! the read-merge-write of a sync are serialized per metric while different
//! metrics proceed independently.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use metasync_core::{MetaRecord, MetricAggregate};
use std::sync::Arc;
use tokio::sync::Mutex;

/// One metric's aggregate, locked for every mutation
pub type AggregateSlot = Mutex<MetricAggregate>;

/// Result of looking up a slot for an observation
pub enum SlotEntry {
    /// The metric was unseen; a slot holding the first observation was inserted
    Created(Arc<AggregateSlot>),
    Existing(Arc<AggregateSlot>),
}

/// In-memory aggregates, one per metric name
#[derive(Default)]
pub struct AggregateCache {
    entries: DashMap<String, Arc<AggregateSlot>>,
}

impl AggregateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the slot for `name`, creating it from `value` if the metric is new.
    ///
    /// `on_create` runs while the map entry is still held, so a concurrent
    /// caller for the same name cannot observe the new slot before it does.
    pub fn get_or_create<F>(&self, name: &str, value: f64, on_create: F) -> SlotEntry
    where
        F: FnOnce(),
    {
        if let Some(slot) = self.entries.get(name) {
            return SlotEntry::Existing(Arc::clone(slot.value()));
        }

        match self.entries.entry(name.to_string()) {
            Entry::Occupied(entry) => SlotEntry::Existing(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let slot = Arc::new(Mutex::new(MetricAggregate::new(name, value)));
                let _held = entry.insert(Arc::clone(&slot));
                on_create();
                SlotEntry::Created(slot)
            }
        }
    }

    pub fn slot(&self, name: &str) -> Option<Arc<AggregateSlot>> {
        self.entries.get(name).map(|slot| Arc::clone(slot.value()))
    }

    /// Current in-memory state of a metric
    pub async fn get(&self, name: &str) -> Option<MetricAggregate> {
        let slot = self.slot(name)?;
        let aggregate = slot.lock().await;
        Some(aggregate.clone())
    }

    pub fn remove(&self, name: &str) -> Option<Arc<AggregateSlot>> {
        self.entries.remove(name).map(|(_, slot)| slot)
    }

    /// Install a persisted record, merging into any aggregate already present
    pub async fn seed(&self, record: MetaRecord) {
        let existing = match self.entries.entry(record.id.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(record)));
                return;
            }
            Entry::Occupied(entry) => Arc::clone(entry.get()),
        };

        existing.lock().await.merge_remote(&record);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies of every aggregate, sorted by metric name
    pub async fn snapshot(&self) -> Vec<MetricAggregate> {
        let slots: Vec<Arc<AggregateSlot>> = self
            .entries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut aggregates = Vec::with_capacity(slots.len());
        for slot in slots {
            aggregates.push(slot.lock().await.clone());
        }
        aggregates.sort_by(|a, b| a.id.cmp(&b.id));
        aggregates
    }
}
