//! Metric aggregate cache for metasync
//!
//! This crate keeps a running min/max/count summary per metric in memory and
//! lazily synchronizes it to a shared, versioned store:
//! - `aggregate`: the concurrent map of per-metric aggregates
//! - `scheduler`: debounced flush scheduling and the dirty set
//! - `sync`: the optimistic concurrency read-merge-write loop
//! - `drain`: ordered shutdown phases
//! - `dispatcher`: first-match routing of metric names to policies
//! - `service`: `MetaService`, which ties the pieces together

pub mod aggregate;
pub mod dispatcher;
pub mod drain;
pub mod scheduler;
pub mod service;
pub mod sync;

pub use aggregate::{AggregateCache, AggregateSlot, SlotEntry};
pub use dispatcher::{Dispatcher, LoggingPolicy, MetricPolicy, NoopPolicy, PolicyMatch};
pub use drain::DrainPhase;
pub use scheduler::{FlushKind, FlushScheduler, ScheduleOutcome};
pub use service::{FlushResult, MetaService, MetaServiceBuilder, ObserveOutcome};
pub use sync::{SyncEngine, SyncReport};
