//! `StateStore` implementations.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{ports::StateStore, utils::iso_timestamp_utc, Result};

/// Volatile store; state is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StateFileData {
    saved_at: String,
    entries: BTreeMap<String, serde_json::Value>,
}

/// Single JSON file holding every key.
///
/// The whole map is kept in memory and rewritten on each mutation via a temp
/// file + rename, so a crash never leaves a truncated file behind. The
/// in-memory map only changes once the file write succeeded.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = load_state_file(&path)?
            .map(|d| d.entries)
            .unwrap_or_default();
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn flush(&self, entries: &BTreeMap<String, serde_json::Value>) -> Result<()> {
        let data = StateFileData {
            saved_at: iso_timestamp_utc(),
            entries: entries.clone(),
        };
        let txt = serde_json::to_string_pretty(&data)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, txt).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: serde_json::Value) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.get(key) == Some(&value) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        self.flush(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.flush(&next).await?;
        *entries = next;
        Ok(())
    }
}

fn load_state_file(path: &Path) -> Result<Option<StateFileData>> {
    if !path.exists() {
        return Ok(None);
    }
    let txt = std::fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(None);
    }
    let data: StateFileData = serde_json::from_str(&txt)?;
    Ok(Some(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tmp_path(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.json"))
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let path = tmp_path("ylb-store-test");

        let store = JsonFileStore::open(&path).unwrap();
        store.put("session:1:1", json!({"a": 1})).await.unwrap();
        store.put("users", json!([5, 6])).await.unwrap();
        store.delete("users").await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("session:1:1").await.unwrap(),
            Some(json!({"a": 1}))
        );
        assert_eq!(reopened.get("users").await.unwrap(), None);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let store = JsonFileStore::open(tmp_path("ylb-store-missing")).unwrap();
        assert_eq!(store.get("anything").await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_in_step_with_disk() {
        let dir = tmp_path("ylb-store-dir").with_extension("");
        let path = dir.join("state.json");
        let store = JsonFileStore::open(&path).unwrap();

        // The parent directory does not exist yet, so the write fails.
        assert!(store.put("users", json!([5])).await.is_err());
        assert_eq!(store.get("users").await.unwrap(), None);

        std::fs::create_dir_all(&dir).unwrap();
        store.put("users", json!([5])).await.unwrap();
        assert!(path.exists());

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("users").await.unwrap(), Some(json!([5])));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn failed_delete_keeps_the_entry() {
        let dir = tmp_path("ylb-store-del").with_extension("");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.put("users", json!([5])).await.unwrap();

        std::fs::remove_dir_all(&dir).unwrap();
        assert!(store.delete("users").await.is_err());
        assert_eq!(store.get("users").await.unwrap(), Some(json!([5])));

        std::fs::create_dir_all(&dir).unwrap();
        store.delete("users").await.unwrap();
        assert_eq!(store.get("users").await.unwrap(), None);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
