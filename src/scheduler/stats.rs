//! Scheduler counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Live counters shared by the scheduler and its workers
#[derive(Debug, Default)]
pub struct SchedulerStats {
    /// Tasks submitted
    pub submitted: AtomicU64,

    /// Tasks completed successfully
    pub completed: AtomicU64,

    /// Tasks failed permanently
    pub failed: AtomicU64,

    /// Retries scheduled
    pub retries: AtomicU64,

    /// Slots handed out with a dequeued task
    pub slots_acquired: AtomicU64,

    /// Slots given back
    pub slots_released: AtomicU64,

    /// Highest number of tasks running at once
    pub peak_concurrency: AtomicUsize,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn observe_running(&self, running: usize) {
        self.peak_concurrency.fetch_max(running, Ordering::Relaxed);
    }

    /// Get a snapshot of current stats
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            slots_acquired: self.slots_acquired.load(Ordering::Relaxed),
            slots_released: self.slots_released.load(Ordering::Relaxed),
            peak_concurrency: self.peak_concurrency.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of scheduler statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub retries: u64,
    pub slots_acquired: u64,
    pub slots_released: u64,
    pub peak_concurrency: usize,
}

impl StatsSnapshot {
    /// Tasks that reached a terminal state
    pub fn finished(&self) -> u64 {
        self.completed + self.failed
    }

    /// Calculate success rate as percentage
    pub fn success_rate(&self) -> f64 {
        let finished = self.finished();
        if finished == 0 {
            0.0
        } else {
            (self.completed as f64 / finished as f64) * 100.0
        }
    }
}
