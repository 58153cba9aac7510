//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`; the error renders as a
//! JSON `{"error": ...}` body with a matching status code. Storage failures
//! are logged in full and answered with a generic message.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scriptflow_core::api::ErrorBody;
use scriptflow_execution::RegistryError;
use scriptflow_storage::StorageError;
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The request carried no caller identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The resource belongs to another user.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Propagated from the script store.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ServerError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m),
            ServerError::Forbidden(m) => (StatusCode::FORBIDDEN, m),
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ServerError::Storage(StorageError::NotFound(m)) => {
                (StatusCode::NOT_FOUND, format!("{m} not found"))
            }
            ServerError::Storage(e) => {
                error!(error = %e, "storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<RegistryError> for ServerError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(_) => ServerError::NotFound(e.to_string()),
            RegistryError::Forbidden(_) => ServerError::Forbidden(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scriptflow_core::TaskId;

    #[test]
    fn test_status_codes() {
        let id = TaskId::new();
        let cases = [
            (ServerError::from(RegistryError::NotFound(id)), StatusCode::NOT_FOUND),
            (ServerError::from(RegistryError::Forbidden(id)), StatusCode::FORBIDDEN),
            (ServerError::Unauthorized("no id".into()), StatusCode::UNAUTHORIZED),
            (ServerError::BadRequest("bad".into()), StatusCode::BAD_REQUEST),
            (
                ServerError::Storage(StorageError::NotFound("script x".into())),
                StatusCode::NOT_FOUND,
            ),
            (
                ServerError::Storage(StorageError::Io(std::io::Error::other("disk full"))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
