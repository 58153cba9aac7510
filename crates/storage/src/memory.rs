//! In-memory script store, used when no data directory is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use scriptflow_core::{NewScript, OwnerId, Script, ScriptId, ScriptUpdate};
use tokio::sync::Mutex;

use super::{sort_recent_first, Result, ScriptStore, StorageError};

/// Script store backed by a map. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStorage {
    scripts: Mutex<HashMap<ScriptId, Script>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScriptStore for MemoryStorage {
    async fn create(&self, new: NewScript, owner: &OwnerId) -> Result<Script> {
        let script = Script::create(new, owner.clone());
        self.scripts.lock().await.insert(script.id, script.clone());
        Ok(script)
    }

    async fn get(&self, id: ScriptId) -> Result<Option<Script>> {
        Ok(self.scripts.lock().await.get(&id).cloned())
    }

    async fn list(&self, owner: &OwnerId) -> Result<Vec<Script>> {
        let mut scripts: Vec<Script> = self
            .scripts
            .lock()
            .await
            .values()
            .filter(|s| &s.owner_id == owner)
            .cloned()
            .collect();
        sort_recent_first(&mut scripts);
        Ok(scripts)
    }

    async fn update(&self, id: ScriptId, update: ScriptUpdate) -> Result<Script> {
        let mut scripts = self.scripts.lock().await;
        let script = scripts
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("script {id}")))?;
        script.apply(update);
        Ok(script.clone())
    }

    async fn delete(&self, id: ScriptId) -> Result<bool> {
        Ok(self.scripts.lock().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_is_owner_scoped() {
        let store = MemoryStorage::new();
        let alice = OwnerId::new("alice");
        let bob = OwnerId::new("bob");

        store.create(NewScript::default(), &alice).await.unwrap();
        store.create(NewScript::default(), &alice).await.unwrap();
        store.create(NewScript::default(), &bob).await.unwrap();

        assert_eq!(store.list(&alice).await.unwrap().len(), 2);
        assert_eq!(store.list(&bob).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_is_not_found() {
        let store = MemoryStorage::new();
        let err = store
            .update(ScriptId::new(), ScriptUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let store = MemoryStorage::new();
        let script = store
            .create(NewScript::default(), &OwnerId::new("alice"))
            .await
            .unwrap();

        assert!(store.delete(script.id).await.unwrap());
        assert!(!store.delete(script.id).await.unwrap());
        assert!(store.get(script.id).await.unwrap().is_none());
    }
}
