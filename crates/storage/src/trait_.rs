//! Storage trait abstraction.

use async_trait::async_trait;
use scriptflow_core::{NewScript, OwnerId, Script, ScriptId, ScriptUpdate};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Store for finished script artifacts.
///
/// Implementations are shared between request handlers, so every method
/// takes `&self`.
#[async_trait]
pub trait ScriptStore: Send + Sync {
    /// Save a new script.
    async fn create(&self, new: NewScript, owner: &OwnerId) -> Result<Script>;

    /// Load a script by ID.
    async fn get(&self, id: ScriptId) -> Result<Option<Script>>;

    /// List an owner's scripts, most recently updated first.
    async fn list(&self, owner: &OwnerId) -> Result<Vec<Script>>;

    /// Apply a partial update. Fails with `NotFound` for unknown IDs.
    async fn update(&self, id: ScriptId, update: ScriptUpdate) -> Result<Script>;

    /// Delete a script. Returns `false` if it did not exist.
    async fn delete(&self, id: ScriptId) -> Result<bool>;
}

/// Order scripts newest-update first.
pub(crate) fn sort_recent_first(scripts: &mut [Script]) {
    scripts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}
