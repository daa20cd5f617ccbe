//! The metadata service: one explicit instance owning the aggregate map,
//! the flush scheduler, the sync engine and the dispatcher.

mod builder;
mod flush;
mod operations;

pub use builder::MetaServiceBuilder;
pub(crate) use flush::flush_metric;

use crate::aggregate::AggregateCache;
use crate::dispatcher::Dispatcher;
use crate::scheduler::FlushScheduler;
use crate::sync::SyncEngine;
use metasync_config::Config;
use metasync_core::Result;
use metasync_store::MetaStore;
use metasync_utils::RetryConfig;
use std::sync::Arc;

/// What an observation did to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveOutcome {
    /// First observation of the metric; an immediate flush was requested
    Created,
    /// Folded into an existing aggregate; a debounced flush was requested
    Updated,
    /// The service is draining or stopped
    Ignored,
}

/// Result of flushing a single metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushResult {
    Persisted { version: u64 },
    /// Nothing to write: the metric was clean or no longer exists
    Skipped,
}

pub(crate) struct ServiceInner {
    pub(crate) aggregates: AggregateCache,
    pub(crate) scheduler: FlushScheduler,
    pub(crate) sync: SyncEngine,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) backoff: RetryConfig,
    pub(crate) drain_attempts: u32,
}

/// Handle to the metadata service. Cloning is cheap and every clone drives
/// the same state.
#[derive(Clone)]
pub struct MetaService {
    pub(crate) inner: Arc<ServiceInner>,
}

impl MetaService {
    pub fn builder() -> MetaServiceBuilder {
        MetaServiceBuilder::new()
    }

    /// Service wired from configuration: refresh interval, backoff and
    /// policy routes all come from `config`
    pub fn from_config(config: &Config, store: Arc<dyn MetaStore>) -> Result<Self> {
        MetaServiceBuilder::from_config(config)?
            .with_store(store)
            .build()
    }

    pub fn store(&self) -> &Arc<dyn MetaStore> {
        self.inner.sync.store()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }
}
