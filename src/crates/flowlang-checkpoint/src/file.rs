//! [`FileCheckpointStore`] — the single-JSON-file backend described in the spec.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::checkpoint::CheckpointState;
use crate::error::{CheckpointError, Result};
use crate::traits::CheckpointStore;

/// Persists a [`CheckpointState`] to `<logs_root>/checkpoint.json`.
///
/// Writes are atomic: the new state is written to a sibling temp file and then
/// renamed over the real path, so a crash mid-write can never leave a half-written
/// checkpoint behind. `load` treats a missing file as "no checkpoint yet" rather
/// than an error — that is how the runner distinguishes a fresh run from a resume.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    /// Create a store rooted at `<logs_root>/checkpoint.json`.
    pub fn new(logs_root: impl AsRef<Path>) -> Self {
        Self {
            path: logs_root.as_ref().join("checkpoint.json"),
        }
    }

    /// The exact path this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, state: &CheckpointState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec_pretty(state)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &body).await?;
        fs::rename(&tmp_path, &self.path).await?;
        tracing::debug!(path = %self.path.display(), node = %state.current_node, "checkpoint saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<CheckpointState>> {
        let body = match fs::read(&self.path).await {
            Ok(body) => body,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CheckpointError::Io(err)),
        };
        let state: CheckpointState = serde_json::from_slice(&body)
            .map_err(|e| CheckpointError::Corrupt(e.to_string()))?;
        Ok(Some(state))
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CheckpointError::Io(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn load_on_fresh_directory_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        let mut state = CheckpointState::fresh("node_b", Utc::now());
        state.completed_nodes.push("start".into());
        state.completed_nodes.push("node_a".into());

        store.save(&state).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.current_node, "node_b");
        assert_eq!(loaded.completed_nodes, vec!["start", "node_a"]);
    }

    #[tokio::test]
    async fn save_overwrites_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());

        store.save(&CheckpointState::fresh("a", Utc::now())).await.unwrap();
        store.save(&CheckpointState::fresh("b", Utc::now())).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.current_node, "b");
    }

    #[tokio::test]
    async fn clear_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        store.save(&CheckpointState::fresh("a", Utc::now())).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        // clearing again is a no-op, not an error
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_file_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        fs::create_dir_all(dir.path()).await.unwrap();
        fs::write(store.path(), b"not json").await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, CheckpointError::Corrupt(_)));
    }
}
