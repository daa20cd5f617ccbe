//! Flushing: the scheduled task body, single-metric flush and full flush.

use super::{FlushResult, MetaService, ServiceInner};
use crate::drain::DrainPhase;
use crate::scheduler::{FlushKind, ScheduleOutcome};
use futures::future::join_all;
use metasync_core::{Error, Result};
use std::sync::Arc;
use tracing::Instrument;

/// Synchronize one metric if it is still dirty.
///
/// The dirty check and the sync both happen under the aggregate's lock, so
/// an observation cannot land between the write and clearing the dirty
/// flag. On failure the metric stays dirty.
pub(crate) async fn flush_metric(inner: &Arc<ServiceInner>, name: &str) -> Result<FlushResult> {
    let Some(slot) = inner.aggregates.slot(name) else {
        inner.scheduler.mark_clean(name);
        return Ok(FlushResult::Skipped);
    };

    let mut aggregate = slot.lock().await;
    if !inner.scheduler.is_dirty(name) {
        return Ok(FlushResult::Skipped);
    }

    let report = inner.sync.synchronize(&mut aggregate).await?;
    inner.scheduler.mark_clean(name);
    drop(aggregate);

    if report.created {
        tracing::info!(metric = %name, version = report.version, "created metric metadata");
    }
    inner.dispatcher.activate(name);

    Ok(FlushResult::Persisted {
        version: report.version,
    })
}

/// Ask the scheduler for a flush of `name`. The spawned task holds only a
/// weak reference, so a dropped service does not keep flushing.
///
/// A failed run re-arms itself only while the service is running; once a
/// drain has started the metric belongs to the drain.
pub(crate) fn schedule_flush(
    inner: &Arc<ServiceInner>,
    name: &str,
    kind: FlushKind,
) -> ScheduleOutcome {
    let weak = Arc::downgrade(inner);
    let metric = name.to_string();

    inner.scheduler.request(name, kind, move |token| {
        let span = metasync_utils::tracing::sync_span(&metric);
        async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.scheduler.begin_fire(&metric, token) {
                return;
            }
            if let Err(e) = flush_metric(&inner, &metric).await {
                tracing::warn!(
                    metric = %metric,
                    error = %e,
                    "metadata flush failed, will retry on the next refresh"
                );
                if inner.scheduler.phase() == DrainPhase::Running {
                    schedule_flush(&inner, &metric, FlushKind::Debounced);
                }
            }
        }
        .instrument(span)
    })
}

impl MetaService {
    /// Synchronize every dirty metric now, without stopping.
    ///
    /// Pending delayed flushes are superseded. Metrics that fail stay dirty,
    /// get a fresh debounced flush, and are reported in
    /// `Error::FlushIncomplete`. Returns the number of records written.
    pub async fn flush_all(&self) -> Result<usize> {
        let inner = &self.inner;
        if self.phase() != DrainPhase::Running {
            return Err(Error::Stopped);
        }

        let names = inner.scheduler.dirty_metrics();
        for name in &names {
            inner.scheduler.cancel_pending(name);
        }
        tracing::debug!(dirty = names.len(), "flushing all dirty metrics");

        let results = join_all(names.iter().map(|name| flush_metric(inner, name))).await;

        let mut persisted = 0;
        let mut failed = Vec::new();
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(FlushResult::Persisted { .. }) => persisted += 1,
                Ok(FlushResult::Skipped) => {}
                Err(e) => {
                    tracing::warn!(metric = %name, error = %e, "metadata flush failed");
                    if inner.scheduler.phase() == DrainPhase::Running {
                        schedule_flush(inner, &name, FlushKind::Debounced);
                    }
                    failed.push(name);
                }
            }
        }

        if failed.is_empty() {
            Ok(persisted)
        } else {
            Err(Error::FlushIncomplete { failed })
        }
    }

    /// Synchronize a single metric now, whether or not a flush is pending.
    /// Fails with `Error::Stopped` once a drain has been requested.
    pub async fn flush(&self, name: &str) -> Result<FlushResult> {
        if self.phase() != DrainPhase::Running {
            return Err(Error::Stopped);
        }
        self.inner.scheduler.cancel_pending(name);
        let result = flush_metric(&self.inner, name).await;
        if result.is_err() && self.phase() == DrainPhase::Running {
            schedule_flush(&self.inner, name, FlushKind::Debounced);
        }
        result
    }
}
