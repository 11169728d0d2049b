//! Local file-based entity store backend.
//!
//! Entries are cached in a [`MemoryEntityStore`] and every mutation writes a
//! JSON snapshot of the whole map to disk (temp file, then rename). The cache
//! only changes once the snapshot is on disk.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Result, StoreError};

use super::memory::MemoryEntityStore;
use super::store::{EntityStore, Mutator};

/// Default state file name.
pub const STATE_FILE: &str = "module-state.json";

/// File-backed entity store.
#[derive(Debug)]
pub struct FileEntityStore<V> {
    /// Path to the state file.
    state_path: PathBuf,
    /// In-memory view of the file.
    cache: MemoryEntityStore<V>,
    /// Serializes mutations so each snapshot is built from the latest cache.
    write_lock: Mutex<()>,
}

impl<V> FileEntityStore<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Opens the store in `base_dir`, loading existing entries.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing state file cannot be read or parsed.
    pub async fn open_dir(base_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(base_dir.as_ref().join(STATE_FILE)).await
    }

    /// Opens the store backed by `state_path`, loading existing entries.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing state file cannot be read or parsed.
    pub async fn open(state_path: impl Into<PathBuf>) -> Result<Self> {
        let state_path = state_path.into();
        let entries = Self::read_file(&state_path).await?;

        Ok(Self {
            state_path,
            cache: MemoryEntityStore::with_entries(entries),
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.state_path
    }

    /// Reads the state file if it exists.
    async fn read_file(path: &Path) -> Result<BTreeMap<String, V>> {
        if !path.exists() {
            debug!("State file does not exist: {}", path.display());
            return Ok(BTreeMap::new());
        }

        info!("Loading module state from: {}", path.display());

        let content = fs::read_to_string(path).await.map_err(|e| StoreError::Corrupted {
            message: format!("Failed to read state file: {e}"),
        })?;

        let entries: BTreeMap<String, V> =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupted {
                message: format!("Failed to parse state file: {e}"),
            })?;

        Ok(entries)
    }

    /// Cache contents with `key` set to `value`, or removed when `None`.
    fn next_snapshot(&self, key: &str, value: Option<&V>) -> BTreeMap<String, V> {
        let mut snapshot: BTreeMap<String, V> = self.cache.snapshot().into_iter().collect();
        match value {
            Some(v) => snapshot.insert(key.to_string(), v.clone()),
            None => snapshot.remove(key),
        };
        snapshot
    }

    /// Writes `snapshot` to disk. Callers hold the write lock.
    async fn persist(&self, snapshot: &BTreeMap<String, V>) -> Result<()> {
        if let Some(parent) = self.state_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            debug!("Creating state directory: {}", parent.display());
            fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::unavailable(format!("Failed to create state directory: {e}"))
            })?;
        }

        let content = serde_json::to_string_pretty(snapshot)
            .map_err(|e| StoreError::serialization(format!("Failed to serialize state: {e}")))?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = self.state_path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            StoreError::unavailable(format!("Failed to create temp state file: {e}"))
        })?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StoreError::unavailable(format!("Failed to write state file: {e}")))?;

        file.sync_all()
            .await
            .map_err(|e| StoreError::unavailable(format!("Failed to sync state file: {e}")))?;

        fs::rename(&temp_path, &self.state_path)
            .await
            .map_err(|e| StoreError::unavailable(format!("Failed to rename state file: {e}")))?;

        debug!("Module state saved to {}", self.state_path.display());
        Ok(())
    }
}

#[async_trait]
impl<V> EntityStore<V> for FileEntityStore<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(self.cache.get_sync(key))
    }

    async fn update(&self, key: &str, mutator: Mutator<'_, V>) -> Result<V> {
        let _guard = self.write_lock.lock().await;
        let current = self.cache.get_sync(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        let next = mutator(&current);

        self.persist(&self.next_snapshot(key, Some(&next))).await?;
        self.cache.insert_sync(key, next.clone());
        Ok(next)
    }

    async fn put_or_update(&self, key: &str, initial: V, mutator: Mutator<'_, V>) -> Result<V> {
        let _guard = self.write_lock.lock().await;
        let next = match self.cache.get_sync(key) {
            Some(current) => mutator(&current),
            None => initial,
        };

        self.persist(&self.next_snapshot(key, Some(&next))).await?;
        self.cache.insert_sync(key, next.clone());
        Ok(next)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.cache.get_sync(key).is_none() {
            return Ok(());
        }

        self.persist(&self.next_snapshot(key, None)).await?;
        self.cache.remove_sync(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.cache.keys_sync())
    }

    fn backend_type(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EdgeError;
    use crate::state::ModuleState;
    use chrono::Utc;
    use tempfile::TempDir;

    async fn create_test_store() -> (FileEntityStore<ModuleState>, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FileEntityStore::open_dir(temp_dir.path())
            .await
            .expect("Failed to open store");
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let (store, temp) = create_test_store().await;
        let now = Utc::now();

        store
            .put_or_update("sensor", ModuleState::first_restart(now), &|s| s.record_restart(now))
            .await
            .expect("Failed to store state");

        let reopened = FileEntityStore::<ModuleState>::open_dir(temp.path())
            .await
            .expect("Failed to reopen store");
        let state = reopened
            .get("sensor")
            .await
            .expect("Failed to load state")
            .expect("State should exist");

        assert_eq!(state.restart_count(), 1);
    }

    #[tokio::test]
    async fn test_open_nonexistent() {
        let (store, _temp) = create_test_store().await;

        assert!(store.keys().await.expect("keys should not fail").is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_remove_persists() {
        let (store, temp) = create_test_store().await;
        let now = Utc::now();

        store
            .put_or_update("sensor", ModuleState::first_restart(now), &|s| s.record_restart(now))
            .await
            .expect("Failed to store state");
        store.remove("sensor").await.expect("Failed to remove");

        let reopened = FileEntityStore::<ModuleState>::open_dir(temp.path())
            .await
            .expect("Failed to reopen store");
        assert!(reopened.get("sensor").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_corrupted_file_rejected() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp.path().join(STATE_FILE), "not json").expect("write");

        let result = FileEntityStore::<ModuleState>::open_dir(temp.path()).await;
        assert!(matches!(
            result,
            Err(EdgeError::Store(StoreError::Corrupted { .. }))
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let (store, temp) = create_test_store().await;
        let now = Utc::now();
        store
            .put_or_update("sensor", ModuleState::first_restart(now), &|s| s.record_restart(now))
            .await
            .expect("Failed to store state");

        // A directory where the temp file goes makes every write fail.
        std::fs::create_dir(store.path().with_extension("tmp")).expect("block temp file");
        for _ in 0..3 {
            let result = store
                .put_or_update("sensor", ModuleState::first_restart(now), &|s| {
                    s.record_restart(now)
                })
                .await;
            assert!(matches!(
                result,
                Err(EdgeError::Store(StoreError::Unavailable { .. }))
            ));
        }
        assert!(store.update("sensor", &|s| s.reset()).await.is_err());
        assert!(store.remove("sensor").await.is_err());

        let state = store.get("sensor").await.expect("get").expect("state");
        assert_eq!(state.restart_count(), 1);

        let reopened = FileEntityStore::<ModuleState>::open_dir(temp.path())
            .await
            .expect("Failed to reopen store");
        let persisted = reopened.get("sensor").await.expect("get").expect("state");
        assert_eq!(persisted, state);
    }

    #[tokio::test]
    async fn test_failed_first_write_stores_nothing() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, "").expect("write blocker");
        let store = FileEntityStore::<ModuleState>::open(blocker.join(STATE_FILE))
            .await
            .expect("Failed to open store");

        let result = store
            .put_or_update("sensor", ModuleState::first_restart(Utc::now()), &|s| *s)
            .await;

        assert!(result.is_err());
        assert!(store.get("sensor").await.expect("get").is_none());
        assert!(store.keys().await.expect("keys").is_empty());
    }
}
