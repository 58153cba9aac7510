//! Task API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use scriptflow_core::api::{
    CancelTaskResponse, ErrorBody, SubmitTaskRequest, SubmitTaskResponse, OWNER_HEADER,
};
use scriptflow_core::{OwnerId, TaskId, TaskParams, TaskStatusView};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Timeout of a single request to the task API.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors talking to the task API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport or decoding failure
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error status
    #[error("server returned {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Server-provided message
        message: String,
    },
}

/// The server side of the task protocol, as seen by a client.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Submit a task and return its ID.
    async fn submit(&self, task_type: &str, params: TaskParams) -> Result<TaskId, ClientError>;

    /// Fetch the current status projection.
    async fn status(&self, id: TaskId) -> Result<TaskStatusView, ClientError>;

    /// Request cancellation.
    async fn cancel(&self, id: TaskId) -> Result<CancelTaskResponse, ClientError>;
}

/// [`TaskApi`] over HTTP, identifying as one user.
#[derive(Clone)]
pub struct HttpTaskApi {
    client: Client,
    base_url: String,
    owner: OwnerId,
}

impl HttpTaskApi {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: impl Into<String>, owner: OwnerId) -> Result<Self, ClientError> {
        let client = ClientBuilder::new().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            owner,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header(OWNER_HEADER, self.owner.as_str())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn submit(&self, task_type: &str, params: TaskParams) -> Result<TaskId, ClientError> {
        let body = SubmitTaskRequest {
            task_type: task_type.to_string(),
            params,
        };
        let response = self
            .request(reqwest::Method::POST, "/tasks")
            .json(&body)
            .send()
            .await?;
        let submitted: SubmitTaskResponse = decode(response).await?;
        debug!(task_id = %submitted.task_id, task_type, "task submitted");
        Ok(submitted.task_id)
    }

    async fn status(&self, id: TaskId) -> Result<TaskStatusView, ClientError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/tasks/{id}"))
            .send()
            .await?;
        decode(response).await
    }

    async fn cancel(&self, id: TaskId) -> Result<CancelTaskResponse, ClientError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/tasks/{id}"))
            .send()
            .await?;
        decode(response).await
    }
}
