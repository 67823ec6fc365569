//! [`InMemoryCheckpointStore`] — a reference `CheckpointStore` for tests and
//! short-lived runs that do not need on-disk durability.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::checkpoint::CheckpointState;
use crate::error::Result;
use crate::traits::CheckpointStore;

/// Keeps the latest [`CheckpointState`] behind a mutex. Never touches the filesystem.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    slot: Mutex<Option<CheckpointState>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, state: &CheckpointState) -> Result<()> {
        *self.slot.lock().await = Some(state.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<CheckpointState>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn starts_empty() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_the_single_slot() {
        let store = InMemoryCheckpointStore::new();
        store.save(&CheckpointState::fresh("a", Utc::now())).await.unwrap();
        store.save(&CheckpointState::fresh("b", Utc::now())).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().current_node, "b");
    }
}
