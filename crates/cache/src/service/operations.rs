//! Observation, lookup, startup load and administrative delete

use super::flush::schedule_flush;
use super::{MetaService, ObserveOutcome};
use crate::aggregate::SlotEntry;
use crate::drain::DrainPhase;
use crate::scheduler::FlushKind;
use metasync_core::{validate_observation, MetricAggregate, Result};
use metasync_store::PurgeReport;

impl MetaService {
    /// Fold `value` into the aggregate of `name` and request a flush.
    ///
    /// Only touches memory and the scheduler; persistence failures never
    /// surface here. Rejects an empty name or a non-finite value.
    pub async fn observe(&self, name: &str, value: f64) -> Result<ObserveOutcome> {
        validate_observation(name, value)?;

        let inner = &self.inner;
        if inner.scheduler.phase() != DrainPhase::Running {
            tracing::debug!(metric = %name, "service is draining, observation ignored");
            return Ok(ObserveOutcome::Ignored);
        }

        let entry = inner.aggregates.get_or_create(name, value, || {
            schedule_flush(inner, name, FlushKind::Immediate);
        });

        match entry {
            SlotEntry::Created(_) => {
                tracing::debug!(metric = %name, value, "new metric observed");
                Ok(ObserveOutcome::Created)
            }
            SlotEntry::Existing(slot) => {
                let mut aggregate = slot.lock().await;
                aggregate.observe(value);
                schedule_flush(inner, name, FlushKind::Debounced);
                Ok(ObserveOutcome::Updated)
            }
        }
    }

    /// Current in-memory aggregate of a metric
    pub async fn get(&self, name: &str) -> Option<MetricAggregate> {
        self.inner.aggregates.get(name).await
    }

    /// Every in-memory aggregate, sorted by metric name
    pub async fn snapshot(&self) -> Vec<MetricAggregate> {
        self.inner.aggregates.snapshot().await
    }

    /// Metrics with changes not yet confirmed persisted, sorted
    pub fn dirty_metrics(&self) -> Vec<String> {
        self.inner.scheduler.dirty_metrics()
    }

    /// Seed the cache from every record in the store and activate each
    /// metric's policy. Seeded metrics are clean. Returns the number of
    /// records loaded.
    pub async fn load(&self) -> Result<usize> {
        let inner = &self.inner;
        let records = inner.sync.store().scan().await?;
        let loaded = records.len();

        for record in records {
            let name = record.id.clone();
            inner.aggregates.seed(record).await;
            inner.dispatcher.activate(&name);
        }

        tracing::info!(metrics = loaded, "loaded metric metadata");
        Ok(loaded)
    }

    /// Remove a metric everywhere: its aggregate, any pending flush, its
    /// policy activation and every persisted record tied to it.
    ///
    /// Waits for an in-flight sync of the metric to finish before purging
    /// the store, so the purge is not undone by a late write.
    pub async fn delete_metric(&self, name: &str) -> Result<PurgeReport> {
        let inner = &self.inner;
        inner.scheduler.cancel(name);
        let slot = inner.aggregates.remove(name);
        inner.dispatcher.forget(name);

        let _in_flight = match &slot {
            Some(slot) => Some(slot.lock().await),
            None => None,
        };
        let report = inner.sync.store().purge_metric(name).await?;

        tracing::info!(
            metric = %name,
            meta = report.meta_removed,
            observations = report.observations_removed,
            windows = report.windows_removed,
            "deleted metric"
        );
        Ok(report)
    }
}
