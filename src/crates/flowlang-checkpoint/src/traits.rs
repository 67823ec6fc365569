//! The `CheckpointStore` trait — the storage abstraction behind resumable runs.
//!
//! The spec calls for a single JSON file on disk ([`crate::file::FileCheckpointStore`]),
//! but the runner only ever talks to this trait, so an embedder can swap in a database-
//! or object-store-backed implementation without touching the execution engine.

use async_trait::async_trait;

use crate::checkpoint::CheckpointState;
use crate::error::Result;

/// Persists and restores a single traversal's [`CheckpointState`].
///
/// Implementations are not required to keep history — `save` is last-write-wins,
/// matching the single-checkpoint-file model in the specification. A checkpoint
/// store that *does* keep history (e.g. for time-travel debugging) is a valid
/// superset implementation as long as `load` returns the latest state.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist `state`, replacing whatever was previously saved.
    async fn save(&self, state: &CheckpointState) -> Result<()>;

    /// Load the most recently saved state, or `None` if nothing has been saved yet
    /// (i.e. this is a fresh run).
    async fn load(&self) -> Result<Option<CheckpointState>>;

    /// Remove any persisted state, e.g. once a traversal has completed.
    async fn clear(&self) -> Result<()>;
}
