//! Task model - one unit of asynchronous AI-generation work.

use crate::id::{OwnerId, TaskId};
use crate::Time;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameters of a task, passed verbatim to the unit of work.
pub type TaskParams = serde_json::Map<String, serde_json::Value>;

/// Task status.
///
/// ```text
/// Pending ──► Processing ──► Completed
///    │             │    └──► Failed
///    └──► Cancelled ◄┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting in the queue for a free slot
    Pending,
    /// Admitted; its unit of work is in flight
    Processing,
    /// Cancelled by its owner
    Cancelled,
    /// Finished with a result
    Completed,
    /// Finished with an error
    Failed,
}

impl TaskStatus {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Cancelled | TaskStatus::Completed | TaskStatus::Failed
        )
    }

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kinds of work the executor knows how to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    /// Story ideas from keywords
    GenerateLoglines,
    /// Story outline from a chosen logline
    GenerateOutline,
    /// Episode breakdown from an outline
    GenerateEpisodes,
    /// Full script from outline and episodes
    GenerateScript,
    /// Analysis of a source text for adaptation
    AnalyzeText,
    /// Adapted outline from an analysis and adaptation rules
    GenerateAdaptedOutline,
    /// Rewrite of a script section
    RewriteSection,
    /// Continuation of an existing script
    ContinueScript,
}

impl TaskKind {
    /// Every recognised kind.
    pub const ALL: [TaskKind; 8] = [
        TaskKind::GenerateLoglines,
        TaskKind::GenerateOutline,
        TaskKind::GenerateEpisodes,
        TaskKind::GenerateScript,
        TaskKind::AnalyzeText,
        TaskKind::GenerateAdaptedOutline,
        TaskKind::RewriteSection,
        TaskKind::ContinueScript,
    ];

    /// Wire name used in `type` fields.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::GenerateLoglines => "generate-loglines",
            TaskKind::GenerateOutline => "generate-outline",
            TaskKind::GenerateEpisodes => "generate-episodes",
            TaskKind::GenerateScript => "generate-script",
            TaskKind::AnalyzeText => "analyze-text",
            TaskKind::GenerateAdaptedOutline => "generate-adapted-outline",
            TaskKind::RewriteSection => "rewrite-section",
            TaskKind::ContinueScript => "continue-script",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task type string that names no known [`TaskKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task type: {0}")]
pub struct UnknownTaskType(pub String);

impl std::str::FromStr for TaskKind {
    type Err = UnknownTaskType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownTaskType(s.to_string()))
    }
}

/// A task record.
///
/// `result` is set only while `status` is `Completed` and `error` only while
/// it is `Failed`; the transition methods below are the only way the
/// registry mutates a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique identifier
    pub id: TaskId,

    /// Requested task type; validated only when the task executes
    pub task_type: String,

    /// Parameters for the unit of work
    pub params: TaskParams,

    /// Current status
    pub status: TaskStatus,

    /// Submission timestamp
    pub created_at: Time,

    /// Admission timestamp
    pub started_at: Option<Time>,

    /// Set when the task reaches `Completed` or `Failed`
    pub completed_at: Option<Time>,

    /// Set when the task is cancelled
    pub cancelled_at: Option<Time>,

    /// Output of the unit of work
    pub result: Option<serde_json::Value>,

    /// Failure description
    pub error: Option<String>,

    /// Submitting caller
    pub owner_id: OwnerId,
}

impl TaskRecord {
    /// Create a new pending task.
    pub fn new(task_type: impl Into<String>, params: TaskParams, owner_id: OwnerId) -> Self {
        Self {
            id: TaskId::new(),
            task_type: task_type.into(),
            params,
            status: TaskStatus::Pending,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            result: None,
            error: None,
            owner_id,
        }
    }

    /// Move a pending task to `Processing`.
    pub fn start(&mut self, now: Time) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Processing;
        self.started_at = Some(now);
        true
    }

    /// Record the result of a processing task.
    pub fn complete(&mut self, result: serde_json::Value, now: Time) -> bool {
        if self.status != TaskStatus::Processing {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(now);
        true
    }

    /// Record the failure of a processing task.
    pub fn fail(&mut self, error: impl Into<String>, now: Time) -> bool {
        if self.status != TaskStatus::Processing {
            return false;
        }
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(now);
        true
    }

    /// Cancel a pending or processing task, returning the status it had.
    pub fn cancel(&mut self, now: Time) -> Option<TaskStatus> {
        if self.status.is_terminal() {
            return None;
        }
        let previous = self.status;
        self.status = TaskStatus::Cancelled;
        self.cancelled_at = Some(now);
        Some(previous)
    }

    /// When the record became terminal, if it has.
    pub fn finished_at(&self) -> Option<Time> {
        match self.status {
            TaskStatus::Completed | TaskStatus::Failed => self.completed_at,
            TaskStatus::Cancelled => self.cancelled_at,
            _ => None,
        }
    }

    /// Public projection of this record.
    pub fn status_view(&self) -> TaskStatusView {
        TaskStatusView {
            id: self.id,
            task_type: self.task_type.clone(),
            status: self.status,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            cancelled_at: self.cancelled_at,
            error: if self.status == TaskStatus::Failed {
                self.error.clone()
            } else {
                None
            },
            result: if self.status == TaskStatus::Completed {
                self.result.clone()
            } else {
                None
            },
        }
    }
}

/// Status projection returned to clients.
///
/// `result` is only present for completed tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusView {
    /// Task ID
    pub id: TaskId,
    /// Task type as submitted
    #[serde(rename = "type")]
    pub task_type: String,
    /// Current status
    pub status: TaskStatus,
    /// Submission timestamp
    pub created_at: Time,
    /// Admission timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Time>,
    /// Completion timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Time>,
    /// Cancellation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<Time>,
    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Result payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}
