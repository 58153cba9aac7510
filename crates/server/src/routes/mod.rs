//! Axum router construction.
//!
//! [`build`] assembles the application router:
//! - `/health`
//! - `/tasks` submission, status and cancellation
//! - `/scripts` owner-scoped CRUD
//! - CORS and request tracing layers

mod health;
mod scripts;
mod tasks;

use std::sync::Arc;

use axum::http::{header, HeaderName, Method};
use axum::Router;
use scriptflow_core::api::OWNER_HEADER;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(OWNER_HEADER)]);

    Router::new()
        .merge(health::router())
        .merge(tasks::router())
        .merge(scripts::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Router fixtures shared by the route tests.

    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use scriptflow_core::{TaskKind, TaskParams};
    use scriptflow_execution::{DispatchTable, QueueConfig, TaskQueue, TaskRegistry, UnitOfWork};
    use scriptflow_storage::MemoryStorage;
    use serde_json::Value;
    use tower::ServiceExt;

    /// Returns its params as the result.
    struct Echo;

    #[async_trait]
    impl UnitOfWork for Echo {
        async fn perform(&self, params: &TaskParams) -> anyhow::Result<Value> {
            Ok(Value::Object(params.clone()))
        }
    }

    /// Never finishes.
    struct Stuck;

    #[async_trait]
    impl UnitOfWork for Stuck {
        async fn perform(&self, _params: &TaskParams) -> anyhow::Result<Value> {
            std::future::pending().await
        }
    }

    /// `generate-outline` echoes, `generate-script` hangs.
    pub fn app() -> Router {
        let table = DispatchTable::new()
            .with(TaskKind::GenerateOutline, Arc::new(Echo))
            .with(TaskKind::GenerateScript, Arc::new(Stuck));
        let queue = TaskQueue::new(
            Arc::new(TaskRegistry::new()),
            Arc::new(table),
            QueueConfig::default(),
        );
        build(Arc::new(AppState {
            queue,
            scripts: Arc::new(MemoryStorage::new()),
        }))
    }

    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            request = request.header(OWNER_HEADER, user);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response: Response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
