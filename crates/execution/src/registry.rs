//! Task registry - the authoritative map from task ID to task record.
//!
//! Every status query, cancellation and scheduler transition goes through
//! here. The map sits behind a synchronous mutex that is never held across
//! an `.await`, so each transition is observed whole or not at all.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use scriptflow_core::{OwnerId, TaskId, TaskRecord, TaskStatus, TaskStatusView, Time};
use tracing::debug;

/// Successful outcomes of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The task moved to `Cancelled`; `previous` is the status it left.
    Cancelled {
        /// `Pending` or `Processing`
        previous: TaskStatus,
    },
    /// The task had already finished; nothing changed.
    NotActive {
        /// The terminal status it already had
        status: TaskStatus,
    },
}

/// Rejections of a registry request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No record with this ID (never submitted, or evicted)
    #[error("task {0} not found")]
    NotFound(TaskId),

    /// The caller does not own the task
    #[error("task {0} belongs to another user")]
    Forbidden(TaskId),
}

/// In-memory task registry.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    records: Mutex<HashMap<TaskId, TaskRecord>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<TaskId, TaskRecord>> {
        // Transitions are single calls; a poisoned map is still consistent.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a new record.
    pub fn insert(&self, record: TaskRecord) {
        self.records().insert(record.id, record);
    }

    /// Snapshot of a record.
    pub fn get(&self, id: TaskId) -> Option<TaskRecord> {
        self.records().get(&id).cloned()
    }

    /// Status projection of a record.
    pub fn status(&self, id: TaskId) -> Option<TaskStatusView> {
        self.records().get(&id).map(TaskRecord::status_view)
    }

    /// Projections of an owner's tasks, newest first.
    pub fn list(&self, owner: &OwnerId) -> Vec<TaskStatusView> {
        let records = self.records();
        let mut views: Vec<_> = records
            .values()
            .filter(|r| &r.owner_id == owner)
            .map(TaskRecord::status_view)
            .collect();
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        views
    }

    /// Move a pending task to `Processing`. Returns the admitted record, or
    /// `None` if the task is gone or no longer pending.
    pub(crate) fn admit(&self, id: TaskId, now: Time) -> Option<TaskRecord> {
        let mut records = self.records();
        let record = records.get_mut(&id)?;
        record.start(now).then(|| record.clone())
    }

    /// Record the outcome of a unit of work. Returns `false` when the record
    /// is no longer processing (cancelled or evicted) and the outcome was
    /// discarded.
    pub(crate) fn finish(
        &self,
        id: TaskId,
        outcome: Result<serde_json::Value, String>,
        now: Time,
    ) -> bool {
        let mut records = self.records();
        let Some(record) = records.get_mut(&id) else {
            return false;
        };
        match outcome {
            Ok(result) => record.complete(result, now),
            Err(error) => record.fail(error, now),
        }
    }

    /// Cancel a task on behalf of `caller`.
    pub fn cancel(&self, id: TaskId, caller: &OwnerId) -> Result<CancelOutcome, RegistryError> {
        let mut records = self.records();
        let record = records.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        if &record.owner_id != caller {
            return Err(RegistryError::Forbidden(id));
        }
        match record.cancel(chrono::Utc::now()) {
            Some(previous) => Ok(CancelOutcome::Cancelled { previous }),
            None => Ok(CancelOutcome::NotActive {
                status: record.status,
            }),
        }
    }

    /// Number of records with the given status.
    pub fn count(&self, status: TaskStatus) -> usize {
        self.records().values().filter(|r| r.status == status).count()
    }

    /// Total number of records held.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    /// Whether the registry holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop terminal records that finished more than `retention` before `now`.
    pub fn evict_finished(&self, retention: Duration, now: Time) -> usize {
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        let cutoff = now - retention;
        let mut records = self.records();
        let before = records.len();
        records.retain(|_, r| r.finished_at().map_or(true, |at| at > cutoff));
        let evicted = before - records.len();
        if evicted > 0 {
            debug!(evicted, "evicted finished tasks");
        }
        evicted
    }
}
