//! Task queue - accepts tasks, admits them under the concurrency budget and
//! drives them to a terminal state.
//!
//! Admission is event driven: every submission and every completion runs a
//! scheduling pass. A background ticker runs one more pass per interval while
//! tasks are waiting, and evicts finished records past their retention.
//!
//! ```text
//! submit ─► pending (FIFO) ─► scheduling pass ─► Processing ─► executor
//!                 ▲                  ▲                              │
//!                 │                  └────────── completion ◄───────┘
//!              ticker
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use scriptflow_core::{OwnerId, TaskId, TaskParams, TaskRecord, TaskStatus, TaskStatusView};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::executor::{ExecutionError, WorkExecutor};
use crate::registry::{CancelOutcome, RegistryError, TaskRegistry};
use crate::scheduler::{Budget, ResourceScheduler};

/// Configuration for the task queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Concurrency cap and per-task timeout
    pub budget: Budget,
    /// Interval of the fallback scheduling pass
    pub tick_interval: Duration,
    /// How long finished tasks stay queryable
    pub retention: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            budget: Budget::default(),
            tick_interval: Duration::from_secs(1),
            retention: Duration::from_secs(30 * 60),
        }
    }
}

/// Point-in-time counters for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Tasks waiting for a slot
    pub pending: usize,
    /// Tasks in `Processing`
    pub processing: usize,
    /// Units of work still running, including cancelled ones
    pub in_flight: usize,
    /// Records held by the registry
    pub total: usize,
}

struct QueueState {
    pending: VecDeque<TaskId>,
    slots: ResourceScheduler,
}

struct Inner {
    registry: Arc<TaskRegistry>,
    executor: Arc<dyn WorkExecutor>,
    config: QueueConfig,
    state: Mutex<QueueState>,
}

/// Bounded-concurrency FIFO task queue.
///
/// Cheap to clone; clones share the same queue. Methods that may admit work
/// spawn onto the current tokio runtime and must be called from within one.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

impl TaskQueue {
    /// Create a queue over an existing registry and executor.
    pub fn new(
        registry: Arc<TaskRegistry>,
        executor: Arc<dyn WorkExecutor>,
        config: QueueConfig,
    ) -> Self {
        let slots = ResourceScheduler::new(config.budget);
        Self {
            inner: Arc::new(Inner {
                registry,
                executor,
                config,
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    slots,
                }),
            }),
        }
    }

    /// The registry this queue writes to.
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.inner.registry
    }

    // Lock order: queue state, then registry. Never the reverse.
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit a task and return its ID without waiting for execution.
    ///
    /// The task type is not validated here; an unknown type surfaces as a
    /// failed task once it is executed.
    pub fn submit(
        &self,
        task_type: impl Into<String>,
        params: TaskParams,
        owner: OwnerId,
    ) -> TaskId {
        let record = TaskRecord::new(task_type, params, owner);
        let id = record.id;
        info!(task_id = %id, task_type = %record.task_type, owner = %record.owner_id, "task submitted");

        self.inner.registry.insert(record);
        self.state().pending.push_back(id);
        self.run_scheduling_pass();
        id
    }

    /// Status projection of a task.
    pub fn status(&self, id: TaskId) -> Option<TaskStatusView> {
        self.inner.registry.status(id)
    }

    /// Cancel a task on behalf of `caller`.
    ///
    /// Pending tasks leave the queue and are never admitted. Processing tasks
    /// are marked cancelled but their unit of work keeps running; its outcome
    /// is discarded when it arrives.
    pub fn cancel(&self, id: TaskId, caller: &OwnerId) -> Result<CancelOutcome, RegistryError> {
        let outcome = self.inner.registry.cancel(id, caller)?;
        match outcome {
            CancelOutcome::Cancelled {
                previous: TaskStatus::Pending,
            } => {
                self.state().pending.retain(|queued| *queued != id);
                info!(task_id = %id, "pending task cancelled");
            }
            CancelOutcome::Cancelled { previous } => {
                info!(task_id = %id, %previous, "task cancelled; in-flight work will be discarded");
            }
            CancelOutcome::NotActive { status } => {
                debug!(task_id = %id, %status, "cancel ignored for finished task");
            }
        }
        Ok(outcome)
    }

    /// Admit pending tasks while slots are free. Returns how many were
    /// admitted.
    pub fn run_scheduling_pass(&self) -> usize {
        let admitted = {
            let mut state = self.state();
            let mut admitted = Vec::new();
            while state.slots.can_start() {
                let Some(id) = state.pending.pop_front() else {
                    break;
                };
                // Cancelled or evicted while queued.
                let Some(record) = self.inner.registry.admit(id, chrono::Utc::now()) else {
                    continue;
                };
                state.slots.task_started();
                admitted.push(record);
            }
            admitted
        };

        let count = admitted.len();
        for record in admitted {
            self.launch(record);
        }
        count
    }

    /// Number of tasks waiting for a slot.
    pub fn pending_len(&self) -> usize {
        self.state().pending.len()
    }

    /// Current counters.
    pub fn stats(&self) -> QueueStats {
        let (pending, in_flight) = {
            let state = self.state();
            (state.pending.len(), state.slots.active())
        };
        QueueStats {
            pending,
            processing: self.inner.registry.count(TaskStatus::Processing),
            in_flight,
            total: self.inner.registry.len(),
        }
    }

    /// Spawn the fallback ticker. It stops when `shutdown` is cancelled.
    pub fn spawn_ticker(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let queue = self.clone();
        tokio::spawn(async move { queue.run_ticker(shutdown).await })
    }

    async fn run_ticker(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.inner.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if self.pending_len() > 0 {
                        let admitted = self.run_scheduling_pass();
                        if admitted > 0 {
                            debug!(admitted, "ticker admitted tasks");
                        }
                    }
                    self.inner
                        .registry
                        .evict_finished(self.inner.config.retention, chrono::Utc::now());
                }
            }
        }
        debug!("task queue ticker stopped");
    }

    fn launch(&self, record: TaskRecord) {
        debug!(task_id = %record.id, task_type = %record.task_type, "task admitted");
        let queue = self.clone();
        tokio::spawn(async move {
            let outcome = queue.perform(&record).await.map_err(|e| e.to_string());
            queue.on_finished(record.id, outcome);
        });
    }

    async fn perform(&self, record: &TaskRecord) -> Result<serde_json::Value, ExecutionError> {
        let executor = Arc::clone(&self.inner.executor);
        let task_type = record.task_type.clone();
        let params = record.params.clone();

        // A separate task so a panicking unit of work fails only its own record.
        let mut work = tokio::spawn(async move { executor.execute(&task_type, &params).await });

        let joined = match self.inner.config.budget.time_per_task {
            Some(limit) => match tokio::time::timeout(limit, &mut work).await {
                Ok(joined) => joined,
                Err(_) => {
                    work.abort();
                    return Err(ExecutionError::TimedOut(limit));
                }
            },
            None => work.await,
        };

        joined.unwrap_or_else(|e| Err(ExecutionError::Panicked(join_error_message(e))))
    }

    fn on_finished(&self, id: TaskId, outcome: Result<serde_json::Value, String>) {
        let error = outcome.as_ref().err().cloned();
        if self.inner.registry.finish(id, outcome, chrono::Utc::now()) {
            match error {
                None => info!(task_id = %id, "task completed"),
                Some(error) => warn!(task_id = %id, %error, "task failed"),
            }
        } else {
            debug!(task_id = %id, "discarding outcome of task that is no longer processing");
        }

        self.state().slots.task_completed();
        self.run_scheduling_pass();
    }
}

fn join_error_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let panic = err.into_panic();
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
