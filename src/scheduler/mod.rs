//! Bounded-concurrency task scheduler
//!
//! The scheduler owns every [`CrawlTask`] it is given, dispatches them in FIFO
//! order to a [`TaskExecutor`] with at most `max_concurrent_tasks` running at
//! once, and re-enqueues transient failures after an exponential backoff.
//!
//! # Architecture
//!
//! ```text
//!  add_task ──▶ ┌──────────────┐  permit + pop   ┌────────────┐
//!               │  FIFO queue  │ ───────────────▶ │  worker    │──▶ executor
//!               └──────────────┘                  │ (spawned)  │
//!                      ▲                          └─────┬──────┘
//!                      │  backoff timer                 │ outcome
//!                      └──────────── retrying ◀─────────┤
//!                                                       ▼
//!                                            completed / failed + slot release
//! ```
//!
//! Task records, the queue and the active set live behind one
//! `std::sync::Mutex` that is never held across an await point. A
//! `tokio::sync::Semaphore` bounds concurrency; every dequeued task carries a
//! [`TaskSlot`] that gives its permit back exactly once when dropped.
//!
//! # Example
//!
//! ```no_run
//! use farecrawl::error::Error;
//! use farecrawl::models::{CrawlTask, FlightInfo, Route, TaskParameters};
//! use farecrawl::scheduler::{FnExecutor, SchedulerBuilder};
//! use chrono::NaiveDate;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = SchedulerBuilder::new()
//!     .max_concurrent_tasks(2)
//!     .execution_callback(FnExecutor::new(|_task: CrawlTask| async move {
//!         Ok::<Vec<FlightInfo>, Error>(Vec::new())
//!     }))
//!     .build()?;
//!
//! let depart = NaiveDate::from_ymd_opt(2025, 7, 21).unwrap();
//! let statuses = scheduler
//!     .process_batch(vec![TaskParameters::one_way(Route::new("TPE", "SIN"), depart)])
//!     .await;
//! assert_eq!(statuses.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;
pub mod stats;
pub mod summary;

pub use error::{SchedulerError, SchedulerResult};
pub use executor::{FnExecutor, TaskExecutor};
pub use stats::{SchedulerStats, StatsSnapshot};
pub use summary::{BatchSummary, TaskSummary};

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{CrawlErrorTrait, Error, ErrorKind};
use crate::models::{CrawlTask, ErrorInfo, FlightInfo, TaskParameters, TaskStatus};
use crate::utils::retry::{RetryConfig, RetryDecision};

// ============================================================================
// Shared state
// ============================================================================

#[derive(Default)]
struct SchedulerState {
    /// Every task ever submitted, by id
    tasks: HashMap<String, CrawlTask>,

    /// Submission order
    order: Vec<String>,

    /// Pending task ids, FIFO
    queue: VecDeque<String>,

    /// Ids of dispatched tasks whose slot is still held
    active: HashSet<String>,

    /// Retries waiting on their backoff timer
    pending_retries: usize,
}

impl SchedulerState {
    fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.active.is_empty() && self.pending_retries == 0
    }
}

struct Shared {
    state: Mutex<SchedulerState>,
    wake: Notify,
    stats: SchedulerStats,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        // State stays consistent across a panicking holder; keep going
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ============================================================================
// Task slot
// ============================================================================

/// Concurrency slot held by a dequeued task
///
/// Dropping the slot (normally through
/// [`TaskScheduler::release_task_slot`]) removes the task from the active set,
/// returns the semaphore permit and wakes the dispatcher.
pub struct TaskSlot {
    task_id: String,
    shared: Arc<Shared>,
    _permit: OwnedSemaphorePermit,
}

impl TaskSlot {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

impl std::fmt::Debug for TaskSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSlot")
            .field("task_id", &self.task_id)
            .finish()
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        let abandoned = {
            let mut state = self.shared.lock();
            state.active.remove(&self.task_id);

            match state.tasks.get_mut(&self.task_id) {
                // The worker went away without reporting an outcome
                Some(task) if task.status == TaskStatus::Running => {
                    task.mark_failed(ErrorInfo::new(
                        ErrorKind::Api,
                        "task ended without reporting an outcome",
                    ));
                    true
                }
                _ => false,
            }
        };

        if abandoned {
            SchedulerStats::incr(&self.shared.stats.failed);
            error!(task_id = %self.task_id, "Task abandoned by its worker, marked failed");
        }

        SchedulerStats::incr(&self.shared.stats.slots_released);
        self.shared.wake.notify_waiters();
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// FIFO task scheduler with bounded concurrency and retry
pub struct TaskScheduler<E> {
    shared: Arc<Shared>,
    executor: Arc<E>,
    retry: RetryConfig,
    semaphore: Arc<Semaphore>,
    max_concurrent_tasks: usize,
}

impl<E> Clone for TaskScheduler<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            executor: Arc::clone(&self.executor),
            retry: self.retry.clone(),
            semaphore: Arc::clone(&self.semaphore),
            max_concurrent_tasks: self.max_concurrent_tasks,
        }
    }
}

impl<E: TaskExecutor> TaskScheduler<E> {
    /// Create a scheduler from the `[scheduler]` and `[retry]` sections
    pub fn new(config: &Config, executor: E) -> SchedulerResult<Self> {
        SchedulerBuilder::from_config(config)
            .execution_callback(executor)
            .build()
    }

    pub fn builder() -> SchedulerBuilder<E> {
        SchedulerBuilder::new()
    }

    pub fn max_concurrent_tasks(&self) -> usize {
        self.max_concurrent_tasks
    }

    /// Slots not currently held by a task
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Create a pending task and append it to the queue
    pub fn add_task(&self, parameters: TaskParameters) -> String {
        let task = CrawlTask::new(parameters);
        let id = task.id.clone();

        {
            let mut state = self.shared.lock();
            debug!(task_id = %id, name = %task.parameters.name, queued = state.queue.len() + 1, "Task added");
            state.order.push(id.clone());
            state.queue.push_back(id.clone());
            state.tasks.insert(id.clone(), task);
        }

        SchedulerStats::incr(&self.shared.stats.submitted);
        self.shared.wake.notify_waiters();
        id
    }

    /// Snapshot of a task
    pub fn get_task_status(&self, task_id: &str) -> SchedulerResult<CrawlTask> {
        self.shared
            .lock()
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| SchedulerError::task_not_found(task_id))
    }

    pub fn is_queue_empty(&self) -> bool {
        self.shared.lock().queue.is_empty()
    }

    /// Ids of all submitted tasks in submission order
    pub fn task_ids(&self) -> Vec<String> {
        self.shared.lock().order.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Pop the queue head together with its concurrency slot
    ///
    /// Returns `None` immediately when the queue is empty; otherwise waits
    /// for a free slot first. The task is `running` once returned.
    pub async fn get_next_task(&self) -> Option<(CrawlTask, TaskSlot)> {
        if self.is_queue_empty() {
            return None;
        }

        let permit = Arc::clone(&self.semaphore).acquire_owned().await.ok()?;

        let task = {
            let mut guard = self.shared.lock();
            let state = &mut *guard;

            // Another dispatcher may have emptied the queue meanwhile; the
            // permit is dropped with this early return
            let id = state.queue.pop_front()?;
            let task = state.tasks.get_mut(&id)?;
            task.mark_running();
            let snapshot = task.clone();

            state.active.insert(id);
            self.shared.stats.observe_running(state.active.len());
            snapshot
        };

        SchedulerStats::incr(&self.shared.stats.slots_acquired);

        let slot = TaskSlot {
            task_id: task.id.clone(),
            shared: Arc::clone(&self.shared),
            _permit: permit,
        };
        Some((task, slot))
    }

    /// Give a dequeued task's slot back
    pub fn release_task_slot(&self, slot: TaskSlot) {
        debug!(task_id = %slot.task_id(), "Releasing task slot");
        drop(slot);
    }

    /// Record a successful attempt
    pub fn complete_task(&self, task_id: &str, flights: Vec<FlightInfo>) {
        let count = flights.len();

        let finished = {
            let mut state = self.shared.lock();
            match state.tasks.get_mut(task_id) {
                Some(task) if !task.status.is_terminal() => {
                    task.mark_completed(flights);
                    Some((task.attempt_count, task.total_execution_secs()))
                }
                _ => None,
            }
        };

        match finished {
            Some((attempts, total_secs)) => {
                SchedulerStats::incr(&self.shared.stats.completed);
                info!(
                    task_id = task_id,
                    flights = count,
                    retries = attempts,
                    total_secs = total_secs.unwrap_or_default(),
                    "Task completed"
                );
            }
            None => warn!(task_id = task_id, "Ignoring completion for unknown or finished task"),
        }
    }

    /// Classify a failed attempt and either schedule a retry or fail the task
    ///
    /// Retries re-enqueue the task at the tail once the backoff delay has
    /// elapsed; outside a tokio runtime the task is re-enqueued immediately.
    pub fn handle_task_failure(&self, task_id: &str, error: &Error) {
        let kind = error.kind();
        let message = error.to_string();

        let decision = {
            let mut guard = self.shared.lock();
            let state = &mut *guard;

            let Some(task) = state.tasks.get_mut(task_id) else {
                warn!(task_id = task_id, "Failure reported for unknown task");
                return;
            };
            if task.status.is_terminal() {
                return;
            }

            let decision = self.retry.decide(kind, task.attempt_count);
            match decision {
                RetryDecision::Retry { attempt, delay } => {
                    task.mark_retrying(
                        attempt,
                        ErrorInfo::new(kind, message.clone()),
                        delay.as_millis() as u64,
                    );
                    state.pending_retries += 1;
                }
                RetryDecision::GiveUp => {
                    task.mark_failed(ErrorInfo::new(kind, message.clone()));
                }
            }
            (decision, task.attempt_count)
        };

        match decision {
            (RetryDecision::Retry { attempt, delay }, _) => {
                SchedulerStats::incr(&self.shared.stats.retries);
                warn!(
                    task_id = task_id,
                    kind = %kind,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "Task failed, retry scheduled"
                );
                self.schedule_requeue(task_id.to_string(), delay);
            }
            (RetryDecision::GiveUp, attempts) => {
                SchedulerStats::incr(&self.shared.stats.failed);
                error!(
                    task_id = task_id,
                    kind = %kind,
                    retries = attempts,
                    error = %message,
                    "Task failed permanently"
                );
            }
        }
    }

    fn schedule_requeue(&self, task_id: String, delay: Duration) {
        let shared = Arc::clone(&self.shared);

        let requeue = move || {
            {
                let mut state = shared.lock();
                if let Some(task) = state.tasks.get_mut(&task_id) {
                    task.mark_requeued();
                }
                state.queue.push_back(task_id.clone());
                state.pending_retries = state.pending_retries.saturating_sub(1);
            }
            debug!(task_id = %task_id, "Task re-enqueued");
            shared.wake.notify_waiters();
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    requeue();
                });
            }
            Err(_) => requeue(),
        }
    }

    fn spawn_worker(&self, task: CrawlTask, slot: TaskSlot) {
        let scheduler = self.clone();

        tokio::spawn(async move {
            info!(
                task_id = %task.id,
                name = %task.parameters.name,
                attempt = task.attempt_count,
                "Task started"
            );

            match scheduler.executor.execute(&task).await {
                Ok(flights) => scheduler.complete_task(&task.id, flights),
                Err(e) => scheduler.handle_task_failure(&task.id, &e),
            }

            scheduler.release_task_slot(slot);
        });
    }

    /// Dispatch queued tasks until the queue is drained, nothing is running
    /// and no retry is pending
    pub async fn wait_until_idle(&self) {
        loop {
            // Register for wake-ups before looking at the state
            let wake = self.shared.wake.notified();
            tokio::pin!(wake);
            wake.as_mut().enable();

            if let Some((task, slot)) = self.get_next_task().await {
                self.spawn_worker(task, slot);
                continue;
            }

            if self.shared.lock().is_idle() {
                break;
            }

            wake.await;
        }
    }

    fn statuses(&self, ids: &[String]) -> HashMap<String, TaskStatus> {
        let state = self.shared.lock();
        ids.iter()
            .filter_map(|id| state.tasks.get(id).map(|t| (id.clone(), t.status)))
            .collect()
    }

    fn snapshots(&self, ids: &[String]) -> Vec<CrawlTask> {
        let state = self.shared.lock();
        ids.iter()
            .filter_map(|id| state.tasks.get(id).cloned())
            .collect()
    }

    /// Submit every entry, wait for the batch to settle and return the
    /// final status of each submitted task
    pub async fn process_batch(&self, tasks: Vec<TaskParameters>) -> HashMap<String, TaskStatus> {
        let ids: Vec<String> = tasks.into_iter().map(|p| self.add_task(p)).collect();
        info!(tasks = ids.len(), max_concurrent = self.max_concurrent_tasks, "Batch started");

        self.wait_until_idle().await;
        self.statuses(&ids)
    }

    /// Like [`process_batch`](Self::process_batch), returning a full summary
    pub async fn run_batch(&self, tasks: Vec<TaskParameters>) -> BatchSummary {
        let batch_id = Uuid::new_v4().to_string();
        let start = Instant::now();

        let ids: Vec<String> = tasks.into_iter().map(|p| self.add_task(p)).collect();
        info!(batch_id = %batch_id, tasks = ids.len(), "Batch started");

        self.wait_until_idle().await;

        let summary = BatchSummary::new(batch_id, &self.snapshots(&ids), start.elapsed());
        info!(
            batch_id = %summary.batch_id,
            completed = summary.completed,
            failed = summary.failed,
            elapsed_secs = summary.elapsed_secs,
            "Batch finished"
        );
        summary
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`TaskScheduler`]
pub struct SchedulerBuilder<E> {
    max_concurrent_tasks: usize,
    retry: RetryConfig,
    executor: Option<E>,
}

impl<E: TaskExecutor> Default for SchedulerBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: TaskExecutor> SchedulerBuilder<E> {
    pub fn new() -> Self {
        Self {
            max_concurrent_tasks: 4,
            retry: RetryConfig::default(),
            executor: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent_tasks: config.scheduler.max_concurrent_tasks,
            retry: config.retry.clone(),
            executor: None,
        }
    }

    pub fn max_concurrent_tasks(mut self, value: usize) -> Self {
        self.max_concurrent_tasks = value;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Register the executor invoked for every dequeued task
    pub fn execution_callback(mut self, executor: E) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn build(self) -> SchedulerResult<TaskScheduler<E>> {
        if self.max_concurrent_tasks == 0 {
            return Err(SchedulerError::InvalidConcurrency {
                value: self.max_concurrent_tasks,
            });
        }
        let executor = self.executor.ok_or(SchedulerError::MissingExecutor)?;

        Ok(TaskScheduler {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedulerState::default()),
                wake: Notify::new(),
                stats: SchedulerStats::new(),
            }),
            executor: Arc::new(executor),
            retry: self.retry,
            semaphore: Arc::new(Semaphore::new(self.max_concurrent_tasks)),
            max_concurrent_tasks: self.max_concurrent_tasks,
        })
    }
}
