//! JSON file storage implementation.
//!
//! Stores one pretty-printed JSON file per script under `<root>/scripts/`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use scriptflow_core::{NewScript, OwnerId, Script, ScriptId, ScriptUpdate};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use super::{sort_recent_first, Result, ScriptStore, StorageError};

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    /// Serialises read-modify-write cycles on script files.
    write_lock: Mutex<()>,
}

impl JsonStorage {
    /// Create storage rooted at `root`, creating the `scripts/` directory.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("scripts")).await?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn script_path(&self, id: ScriptId) -> PathBuf {
        self.root.join("scripts").join(format!("{}.json", id))
    }

    async fn write_script(&self, script: &Script) -> Result<()> {
        let json = serde_json::to_string_pretty(script)?;
        fs::write(self.script_path(script.id), json.as_bytes()).await?;
        debug!(script_id = %script.id, "script written");
        Ok(())
    }
}

#[async_trait]
impl ScriptStore for JsonStorage {
    async fn create(&self, new: NewScript, owner: &OwnerId) -> Result<Script> {
        let script = Script::create(new, owner.clone());
        let _guard = self.write_lock.lock().await;
        self.write_script(&script).await?;
        Ok(script)
    }

    async fn get(&self, id: ScriptId) -> Result<Option<Script>> {
        read_json(&self.script_path(id)).await
    }

    async fn list(&self, owner: &OwnerId) -> Result<Vec<Script>> {
        let mut scripts: Vec<Script> = list_dir(&self.root.join("scripts"))
            .await?
            .into_iter()
            .filter(|s: &Script| &s.owner_id == owner)
            .collect();
        sort_recent_first(&mut scripts);
        Ok(scripts)
    }

    async fn update(&self, id: ScriptId, update: ScriptUpdate) -> Result<Script> {
        let _guard = self.write_lock.lock().await;
        let mut script: Script = read_json(&self.script_path(id))
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("script {id}")))?;
        script.apply(update);
        self.write_script(&script).await?;
        Ok(script)
    }

    async fn delete(&self, id: ScriptId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(self.script_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        if let Ok(Some(item)) = read_json(&entry.path()).await {
            items.push(item);
        }
    }
    Ok(items)
}
