//! Work executor - dispatches a task to the unit of work for its type.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scriptflow_core::{TaskKind, TaskParams, UnknownTaskType};
use tracing::debug;

/// A long-running operation behind one task kind.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Perform the work and return its result payload.
    async fn perform(&self, params: &TaskParams) -> anyhow::Result<serde_json::Value>;
}

/// Executor - runs units of work by task type.
#[async_trait]
pub trait WorkExecutor: Send + Sync {
    /// Execute the unit of work registered for `task_type`.
    async fn execute(
        &self,
        task_type: &str,
        params: &TaskParams,
    ) -> Result<serde_json::Value, ExecutionError>;
}

/// Why a task failed. Rendered into the task record's `error` field.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The task type names no known kind
    #[error(transparent)]
    UnknownTaskType(#[from] UnknownTaskType),

    /// The kind is known but nothing is registered for it
    #[error("no unit of work registered for task type: {0}")]
    Unregistered(TaskKind),

    /// The unit of work returned an error
    #[error("{0:#}")]
    Failed(anyhow::Error),

    /// The unit of work exceeded the per-task time budget
    #[error("task timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    /// The unit of work panicked
    #[error("task aborted unexpectedly: {0}")]
    Panicked(String),
}

/// Dispatch table from task kind to unit of work.
///
/// Holds no state beyond the table itself and never swallows errors.
#[derive(Default, Clone)]
pub struct DispatchTable {
    units: HashMap<TaskKind, Arc<dyn UnitOfWork>>,
}

impl DispatchTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the unit of work for a kind, replacing any previous one.
    pub fn register(&mut self, kind: TaskKind, unit: Arc<dyn UnitOfWork>) -> &mut Self {
        self.units.insert(kind, unit);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, kind: TaskKind, unit: Arc<dyn UnitOfWork>) -> Self {
        self.register(kind, unit);
        self
    }

    /// Kinds with a registered unit of work.
    pub fn kinds(&self) -> Vec<TaskKind> {
        let mut kinds: Vec<_> = self.units.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

#[async_trait]
impl WorkExecutor for DispatchTable {
    async fn execute(
        &self,
        task_type: &str,
        params: &TaskParams,
    ) -> Result<serde_json::Value, ExecutionError> {
        let kind: TaskKind = task_type.parse()?;
        let unit = self
            .units
            .get(&kind)
            .ok_or(ExecutionError::Unregistered(kind))?;

        debug!(%kind, "dispatching unit of work");
        unit.perform(params).await.map_err(ExecutionError::Failed)
    }
}
