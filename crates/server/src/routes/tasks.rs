//! Task endpoints: submit, list, status and cancel.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use scriptflow_core::api::{CancelTaskResponse, SubmitTaskRequest, SubmitTaskResponse};
use scriptflow_core::{TaskId, TaskStatus, TaskStatusView};
use scriptflow_execution::CancelOutcome;

use crate::auth::Caller;
use crate::error::ServerError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks).post(submit_task))
        .route("/tasks/{id}", get(get_task).delete(cancel_task))
}

fn parse_id(id: &str) -> Result<TaskId, ServerError> {
    // A malformed ID cannot name an existing task.
    id.parse()
        .map_err(|_| ServerError::NotFound(format!("task {id} not found")))
}

pub async fn submit_task(
    State(state): State<Arc<AppState>>,
    Caller(owner): Caller,
    body: Result<Json<SubmitTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitTaskResponse>), ServerError> {
    let Json(req) = body?;
    let task_type = req.task_type.trim();
    if task_type.is_empty() {
        return Err(ServerError::BadRequest("task type is required".into()));
    }

    let task_id = state.queue.submit(task_type, req.params, owner);
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitTaskResponse {
            task_id,
            status: TaskStatus::Pending,
        }),
    ))
}

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Caller(owner): Caller,
) -> Json<Vec<TaskStatusView>> {
    Json(state.queue.registry().list(&owner))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> Result<Json<TaskStatusView>, ServerError> {
    let task_id = parse_id(&id)?;
    let record = state
        .queue
        .registry()
        .get(task_id)
        .ok_or_else(|| ServerError::NotFound(format!("task {id} not found")))?;

    if record.owner_id != owner {
        return Err(ServerError::Forbidden(format!("task {id} belongs to another user")));
    }
    Ok(Json(record.status_view()))
}

pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> Result<Json<CancelTaskResponse>, ServerError> {
    let task_id = parse_id(&id)?;
    let response = match state.queue.cancel(task_id, &owner)? {
        CancelOutcome::Cancelled { .. } => CancelTaskResponse {
            cancelled: true,
            status: None,
        },
        CancelOutcome::NotActive { status } => CancelTaskResponse {
            cancelled: false,
            status: Some(status),
        },
    };
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{app, send};
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use std::time::Duration;

    async fn submit(app: &axum::Router, user: &str, task_type: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/tasks",
            Some(user),
            Some(json!({"type": task_type, "params": {"logline": "A heist"}})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "pending");
        body["taskId"].as_str().unwrap().to_string()
    }

    async fn get(app: &axum::Router, user: &str, id: &str) -> (StatusCode, Value) {
        send(app, "GET", &format!("/tasks/{id}"), Some(user), None).await
    }

    #[tokio::test]
    async fn test_submit_then_poll_to_completion() {
        let app = app();
        let id = submit(&app, "alice", "generate-outline").await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        let (status, body) = get(&app, "alice", &id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["type"], "generate-outline");
        assert_eq!(body["result"]["logline"], "A heist");
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_unknown_type_is_accepted_then_fails() {
        let app = app();
        let id = submit(&app, "alice", "unknown-type").await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        let (_, body) = get(&app, "alice", &id).await;
        assert_eq!(body["status"], "failed");
        assert_eq!(body["error"], "unknown task type: unknown-type");
        assert!(body.get("result").is_none());
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/tasks",
            None,
            Some(json!({"type": "generate-outline"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].as_str().unwrap().contains("x-user-id"));
    }

    #[tokio::test]
    async fn test_empty_type_is_bad_request() {
        let app = app();
        let (status, _) =
            send(&app, "POST", "/tasks", Some("alice"), Some(json!({"type": " "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_bad_request() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/tasks",
            Some("alice"),
            Some(json!({"params": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("missing field `type`"));

        let (_, listed) = send(&app, "GET", "/tasks", Some("alice"), None).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn test_status_is_owner_scoped() {
        let app = app();
        let id = submit(&app, "alice", "generate-script").await;

        let (status, body) = get(&app, "mallory", &id).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"].is_string());

        let (status, _) = get(&app, "alice", "01ARZ3NDEKTSV4RRFFQ69G5FAV").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get(&app, "alice", "not-an-id").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_processing_then_again() {
        let app = app();
        let id = submit(&app, "alice", "generate-script").await;
        let uri = format!("/tasks/{id}");

        let (status, _) = send(&app, "DELETE", &uri, Some("mallory"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, "DELETE", &uri, Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"cancelled": true}));

        let (_, body) = get(&app, "alice", &id).await;
        assert_eq!(body["status"], "cancelled");
        assert!(body["cancelledAt"].is_string());

        let (status, body) = send(&app, "DELETE", &uri, Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"cancelled": false, "status": "cancelled"}));
    }

    #[tokio::test]
    async fn test_list_returns_only_own_tasks() {
        let app = app();
        submit(&app, "alice", "generate-script").await;
        submit(&app, "alice", "generate-script").await;
        submit(&app, "bob", "generate-script").await;

        let (status, body) = send(&app, "GET", "/tasks", Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
    }
}
