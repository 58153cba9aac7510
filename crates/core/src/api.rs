//! Request and response bodies of the task HTTP API.
//!
//! Shared by the server and the client so both sides agree on the wire shape.

use crate::id::TaskId;
use crate::task::{TaskParams, TaskStatus};
use serde::{Deserialize, Serialize};

/// Header carrying the caller identity set by the auth layer.
pub const OWNER_HEADER: &str = "x-user-id";

/// Body of `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitTaskRequest {
    /// Task type, e.g. `generate-outline`
    #[serde(rename = "type")]
    pub task_type: String,
    /// Parameters for the unit of work
    #[serde(default)]
    pub params: TaskParams,
}

/// Response of `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTaskResponse {
    /// ID to poll
    pub task_id: TaskId,
    /// Always `pending` at submission
    pub status: TaskStatus,
}

/// Response of `DELETE /tasks/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelTaskResponse {
    /// Whether this request moved the task to `cancelled`
    pub cancelled: bool,
    /// Status the task already had when nothing changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

/// Error body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Message safe to show to the caller
    pub error: String,
}
