//! Debounced flush scheduling.
//!
//! The scheduler owns the dirty set and one pending timer task per metric.
//! A metric that becomes dirty while it already has a pending flush is not
//! scheduled again: the pending run reads whatever the aggregate holds when
//! it fires, so a burst of observations collapses into a single write.
//!
//! Each pending task carries a token. When it fires it must still own its
//! slot in the pending map, which keeps a cancelled task that lost the race
//! with `abort` from stealing a newer task's slot.

use crate::drain::DrainPhase;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How soon a requested flush should run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushKind {
    /// First observation of a metric: flush without waiting
    Immediate,
    /// Later observations: flush after the refresh interval
    Debounced,
}

/// What a flush request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A new task was spawned
    Scheduled,
    /// A task was already pending; it will pick up the latest state
    AlreadyPending,
    /// The service is draining and the metric is left for the drain to
    /// flush, or it has stopped and the request was dropped
    Deferred,
}

struct PendingFlush {
    token: u64,
    handle: JoinHandle<()>,
}

struct SchedulerState {
    phase: DrainPhase,
    dirty: BTreeSet<String>,
    pending: HashMap<String, PendingFlush>,
    next_token: u64,
}

/// Decides when dirty metrics are handed to the sync engine
pub struct FlushScheduler {
    refresh_interval: Duration,
    state: Mutex<SchedulerState>,
}

impl FlushScheduler {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            refresh_interval,
            state: Mutex::new(SchedulerState {
                phase: DrainPhase::Running,
                dirty: BTreeSet::new(),
                pending: HashMap::new(),
                next_token: 0,
            }),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub fn phase(&self) -> DrainPhase {
        self.state.lock().phase
    }

    /// Mark `name` dirty and, unless a flush is already pending, spawn `run`
    /// after the delay implied by `kind`. `run` receives the token it must
    /// present to [`FlushScheduler::begin_fire`].
    ///
    /// Never blocks: the delay is a sleeping task, not the caller's time.
    /// Once stopped, nothing is marked dirty any more.
    pub fn request<F, Fut>(&self, name: &str, kind: FlushKind, run: F) -> ScheduleOutcome
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.state.lock();
        if state.phase == DrainPhase::Stopped {
            return ScheduleOutcome::Deferred;
        }
        state.dirty.insert(name.to_string());

        if state.phase == DrainPhase::Draining {
            return ScheduleOutcome::Deferred;
        }
        if state.pending.contains_key(name) {
            return ScheduleOutcome::AlreadyPending;
        }

        let delay = match kind {
            FlushKind::Immediate => Duration::ZERO,
            FlushKind::Debounced => self.refresh_interval,
        };
        let token = state.next_token;
        state.next_token += 1;

        let handle = tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            run(token).await;
        });
        state
            .pending
            .insert(name.to_string(), PendingFlush { token, handle });

        ScheduleOutcome::Scheduled
    }

    /// Called by a pending task when its delay has elapsed. Clears the
    /// pending slot before the sync starts, so observations arriving during
    /// the sync schedule a fresh flush. Returns whether the task should go
    /// on to flush.
    pub fn begin_fire(&self, name: &str, token: u64) -> bool {
        let mut state = self.state.lock();
        match state.pending.get(name) {
            Some(pending) if pending.token == token => {
                state.pending.remove(name);
            }
            _ => return false,
        }
        state.phase == DrainPhase::Running && state.dirty.contains(name)
    }

    pub fn is_dirty(&self, name: &str) -> bool {
        self.state.lock().dirty.contains(name)
    }

    pub fn is_pending(&self, name: &str) -> bool {
        self.state.lock().pending.contains_key(name)
    }

    /// The metric's latest state is persisted
    pub fn mark_clean(&self, name: &str) {
        self.state.lock().dirty.remove(name);
    }

    /// Sorted copy of the dirty set
    pub fn dirty_metrics(&self) -> Vec<String> {
        self.state.lock().dirty.iter().cloned().collect()
    }

    pub fn dirty_count(&self) -> usize {
        self.state.lock().dirty.len()
    }

    /// Smallest dirty metric name, used by the drain loop
    pub fn next_dirty(&self) -> Option<String> {
        self.state.lock().dirty.first().cloned()
    }

    /// Abort the pending flush of a metric, keeping it dirty
    pub fn cancel_pending(&self, name: &str) {
        if let Some(pending) = self.state.lock().pending.remove(name) {
            pending.handle.abort();
        }
    }

    /// Forget a metric entirely: abort its pending flush and clear it from
    /// the dirty set
    pub fn cancel(&self, name: &str) {
        let mut state = self.state.lock();
        if let Some(pending) = state.pending.remove(name) {
            pending.handle.abort();
        }
        state.dirty.remove(name);
    }

    /// Move from `Running` to `Draining`, aborting every delayed flush.
    /// Returns `false` if a drain was already requested.
    pub fn begin_drain(&self) -> bool {
        let mut state = self.state.lock();
        if state.phase != DrainPhase::Running {
            return false;
        }
        state.phase = DrainPhase::Draining;
        for (_, pending) in state.pending.drain() {
            pending.handle.abort();
        }
        true
    }

    /// Move from `Draining` to `Stopped`, but only once the dirty set is
    /// empty. Checked under the same lock `request` takes, so a metric
    /// marked dirty late in the drain is never stranded.
    pub fn finish_drain(&self) -> bool {
        let mut state = self.state.lock();
        if !state.dirty.is_empty() {
            return false;
        }
        state.phase = DrainPhase::Stopped;
        true
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        for (_, pending) in self.state.get_mut().pending.drain() {
            pending.handle.abort();
        }
    }
}
