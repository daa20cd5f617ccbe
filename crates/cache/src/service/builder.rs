//! Metadata service builder

use super::{MetaService, ServiceInner};
use crate::aggregate::AggregateCache;
use crate::dispatcher::Dispatcher;
use crate::scheduler::FlushScheduler;
use crate::sync::SyncEngine;
use metasync_config::Config;
use metasync_core::{Error, Result, DEFAULT_DRAIN_ATTEMPTS, DEFAULT_REFRESH_INTERVAL_SECS};
use metasync_store::MetaStore;
use metasync_utils::RetryConfig;
use std::sync::Arc;
use std::time::Duration;

/// Builder for MetaService
pub struct MetaServiceBuilder {
    store: Option<Arc<dyn MetaStore>>,
    dispatcher: Option<Dispatcher>,
    refresh_interval: Duration,
    backoff: RetryConfig,
    drain_attempts: u32,
}

impl MetaServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            dispatcher: None,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            backoff: RetryConfig::default(),
            drain_attempts: DEFAULT_DRAIN_ATTEMPTS,
        }
    }

    /// Builder preloaded with everything `config` describes except the store
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let retry = &config.retry;

        Ok(Self::new()
            .with_dispatcher(Dispatcher::from_config(config)?)
            .with_refresh_interval(config.refresh_interval())
            .with_backoff(RetryConfig::new(
                retry.base_delay(),
                retry.max_delay(),
                retry.jitter_factor,
            ))
            .with_drain_attempts(retry.drain_attempts))
    }

    pub fn with_store(mut self, store: Arc<dyn MetaStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_backoff(mut self, backoff: RetryConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_drain_attempts(mut self, attempts: u32) -> Self {
        self.drain_attempts = attempts;
        self
    }

    pub fn build(self) -> Result<MetaService> {
        let store = self
            .store
            .ok_or_else(|| Error::configuration("metadata service requires a store"))?;
        if self.drain_attempts == 0 {
            return Err(Error::configuration("drain attempts must be at least 1"));
        }

        tracing::debug!(
            refresh_interval_secs = self.refresh_interval.as_secs(),
            drain_attempts = self.drain_attempts,
            "building metadata service"
        );

        Ok(MetaService {
            inner: Arc::new(ServiceInner {
                aggregates: AggregateCache::new(),
                scheduler: FlushScheduler::new(self.refresh_interval),
                sync: SyncEngine::new(store, self.backoff.clone()),
                dispatcher: self.dispatcher.unwrap_or_default(),
                backoff: self.backoff,
                drain_attempts: self.drain_attempts,
            }),
        })
    }
}

impl Default for MetaServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
