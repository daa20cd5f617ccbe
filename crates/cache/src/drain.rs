//! Ordered shutdown.
//!
//! The service moves through `Running -> Draining -> Stopped` exactly once.
//! Entering `Draining` cancels every delayed flush and stops accepting
//! observations; the drain then synchronizes each dirty metric in turn and
//! finally parks the service in `Stopped`.

use crate::service::{flush_metric, MetaService};
use metasync_core::{Error, Result};
use metasync_utils::retry;
use std::fmt;

/// Lifecycle phase of a metadata service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPhase {
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for DrainPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrainPhase::Running => write!(f, "running"),
            DrainPhase::Draining => write!(f, "draining"),
            DrainPhase::Stopped => write!(f, "stopped"),
        }
    }
}

impl MetaService {
    /// Flush every dirty metric once more and stop.
    ///
    /// Repeated calls are no-ops. A metric that keeps failing transiently is
    /// retried with backoff up to the configured number of attempts, then
    /// dropped from the dirty set and reported in `Error::FlushIncomplete`,
    /// so shutdown always terminates.
    pub async fn drain_and_stop(&self) -> Result<()> {
        let inner = &self.inner;
        if !inner.scheduler.begin_drain() {
            tracing::debug!(phase = %inner.scheduler.phase(), "drain already requested");
            return Ok(());
        }

        tracing::info!(
            dirty = inner.scheduler.dirty_count(),
            "draining metric metadata"
        );

        let mut abandoned = Vec::new();
        loop {
            while let Some(name) = inner.scheduler.next_dirty() {
                let metric = name.as_str();
                let result = retry(&inner.backoff, inner.drain_attempts, move || {
                    flush_metric(inner, metric)
                })
                .await;

                if let Err(e) = result {
                    tracing::error!(
                        metric = %name,
                        error = %e,
                        "giving up on metric during drain, latest aggregate not persisted"
                    );
                    inner.scheduler.mark_clean(&name);
                    abandoned.push(name);
                }
            }
            // A creation racing the drain may have marked a metric dirty
            // after the loop saw an empty set
            if inner.scheduler.finish_drain() {
                break;
            }
        }

        tracing::info!(abandoned = abandoned.len(), "metric metadata drained");

        if abandoned.is_empty() {
            Ok(())
        } else {
            Err(Error::FlushIncomplete { failed: abandoned })
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> DrainPhase {
        self.inner.scheduler.phase()
    }
}
