//! Resource scheduling and budget management.

use std::num::NonZeroUsize;
use std::time::Duration;

/// Default number of units of work allowed in flight at once.
pub const MAX_CONCURRENT: usize = 3;

/// Budget for task execution.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    /// Time budget per task; `None` lets a unit of work run indefinitely
    pub time_per_task: Option<Duration>,
    /// Max concurrent tasks
    pub max_concurrent: NonZeroUsize,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            time_per_task: Some(Duration::from_secs(600)), // 10 minutes
            max_concurrent: NonZeroUsize::new(MAX_CONCURRENT).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl Budget {
    /// Create a new budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set time budget per task.
    pub fn with_time_per_task(mut self, duration: Option<Duration>) -> Self {
        self.time_per_task = duration;
        self
    }

    /// Set max concurrent tasks.
    pub fn with_max_concurrent(mut self, max: NonZeroUsize) -> Self {
        self.max_concurrent = max;
        self
    }
}

/// Counts admission slots against a [`Budget`].
#[derive(Debug)]
pub struct ResourceScheduler {
    budget: Budget,
    active_tasks: usize,
}

impl ResourceScheduler {
    /// Create a new scheduler.
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            active_tasks: 0,
        }
    }

    /// Check if we can start a new task.
    pub fn can_start(&self) -> bool {
        self.active_tasks < self.budget.max_concurrent.get()
    }

    /// Register a task start.
    pub fn task_started(&mut self) {
        self.active_tasks += 1;
    }

    /// Register a task completion.
    pub fn task_completed(&mut self) {
        self.active_tasks = self.active_tasks.saturating_sub(1);
    }

    /// Units of work currently in flight.
    pub fn active(&self) -> usize {
        self.active_tasks
    }
}

impl Default for ResourceScheduler {
    fn default() -> Self {
        Self::new(Budget::default())
    }
}
