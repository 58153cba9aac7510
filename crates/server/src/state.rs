//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use scriptflow_execution::TaskQueue;
use scriptflow_storage::ScriptStore;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Task queue and its registry.
    pub queue: TaskQueue,
    /// Saved scripts.
    pub scripts: Arc<dyn ScriptStore>,
}
