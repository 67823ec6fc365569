//! The [`ArtifactStore`] (§4.H, artifact half): a map from artifact id to either an
//! in-memory value or a path to a JSON file on disk, selected by a size threshold.
//!
//! Shared across parallel branches, so every operation takes the store's lock —
//! concurrent `store`/`retrieve`/`remove` calls are linearised rather than racing.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::{GraphError, Result};

/// Metadata kept for every artifact regardless of storage location.
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    pub id: String,
    pub content_type: String,
    pub byte_size: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
enum Storage {
    Inline(Value),
    File(PathBuf),
}

#[derive(Debug, Clone)]
struct Entry {
    info: ArtifactInfo,
    storage: Storage,
}

/// Thread-safe artifact store. `base_dir` is `None` when no `logs_root` was configured,
/// in which case every artifact is kept in memory regardless of size.
pub struct ArtifactStore {
    inline_threshold_bytes: usize,
    base_dir: Option<PathBuf>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ArtifactStore {
    pub fn new(inline_threshold_bytes: usize, base_dir: Option<PathBuf>) -> Self {
        Self {
            inline_threshold_bytes,
            base_dir,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn artifact_path(&self, base_dir: &std::path::Path, id: &str) -> PathBuf {
        base_dir.join("artifacts").join(format!("{id}.json"))
    }

    /// Serialize `value`, then keep it in memory or spill it to
    /// `<baseDir>/artifacts/<id>.json` depending on size and whether a base directory
    /// is configured.
    pub async fn store(&self, id: impl Into<String>, value: Value, content_type: impl Into<String>) -> Result<ArtifactInfo> {
        let id = id.into();
        let body = serde_json::to_vec(&value)?;
        let byte_size = body.len();
        let info = ArtifactInfo {
            id: id.clone(),
            content_type: content_type.into(),
            byte_size,
            created_at: Utc::now(),
        };

        let storage = if byte_size > self.inline_threshold_bytes {
            if let Some(base_dir) = &self.base_dir {
                let path = self.artifact_path(base_dir, &id);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|source| GraphError::ArtifactIo { artifact_id: id.clone(), source })?;
                }
                fs::write(&path, &body)
                    .await
                    .map_err(|source| GraphError::ArtifactIo { artifact_id: id.clone(), source })?;
                Storage::File(path)
            } else {
                Storage::Inline(value)
            }
        } else {
            Storage::Inline(value)
        };

        self.entries.lock().await.insert(
            id.clone(),
            Entry {
                info: info.clone(),
                storage,
            },
        );
        Ok(info)
    }

    /// Fetch an artifact's value, transparently re-reading the backing file for
    /// file-backed entries.
    pub async fn retrieve(&self, id: &str) -> Result<Option<Value>> {
        let storage = {
            let entries = self.entries.lock().await;
            match entries.get(id) {
                Some(entry) => entry.storage.clone(),
                None => return Ok(None),
            }
        };
        match storage {
            Storage::Inline(v) => Ok(Some(v)),
            Storage::File(path) => {
                let body = fs::read(&path)
                    .await
                    .map_err(|source| GraphError::ArtifactIo { artifact_id: id.to_string(), source })?;
                let value: Value = serde_json::from_slice(&body)?;
                Ok(Some(value))
            }
        }
    }

    pub async fn info(&self, id: &str) -> Option<ArtifactInfo> {
        self.entries.lock().await.get(id).map(|e| e.info.clone())
    }

    /// Remove the in-memory entry and, if file-backed, delete the backing file too.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let removed = self.entries.lock().await.remove(id);
        if let Some(Entry { storage: Storage::File(path), .. }) = removed {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(GraphError::ArtifactIo { artifact_id: id.to_string(), source }),
            }
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn small_artifact_stays_inline() {
        let store = ArtifactStore::new(100_000, None);
        let info = store.store("a", json!({"x": 1}), "application/json").await.unwrap();
        assert!(info.byte_size < 100_000);
        assert_eq!(store.retrieve("a").await.unwrap(), Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn oversized_artifact_without_base_dir_still_stays_inline() {
        let store = ArtifactStore::new(4, None);
        let info = store.store("a", json!({"big": "value"}), "application/json").await.unwrap();
        assert!(info.byte_size > 4);
        assert_eq!(store.retrieve("a").await.unwrap(), Some(json!({"big": "value"})));
    }

    #[tokio::test]
    async fn oversized_artifact_with_base_dir_spills_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(4, Some(dir.path().to_path_buf()));
        store.store("a", json!({"big": "value"}), "application/json").await.unwrap();
        let path = dir.path().join("artifacts").join("a.json");
        assert!(path.exists());
        assert_eq!(store.retrieve("a").await.unwrap(), Some(json!({"big": "value"})));
    }

    #[tokio::test]
    async fn remove_deletes_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(4, Some(dir.path().to_path_buf()));
        store.store("a", json!({"big": "value"}), "application/json").await.unwrap();
        let path = dir.path().join("artifacts").join("a.json");
        store.remove("a").await.unwrap();
        assert!(!path.exists());
        assert_eq!(store.retrieve("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_artifact_retrieve_returns_none() {
        let store = ArtifactStore::new(100, None);
        assert_eq!(store.retrieve("nope").await.unwrap(), None);
    }
}
