//! # flowlang-checkpoint - Single-File Checkpoint Persistence
//!
//! A minimal checkpoint layer for resumable pipeline traversals. A checkpoint is a
//! JSON snapshot of one traversal's progress: the node it was standing on, the
//! nodes already behind it, per-node retry counters, the full context map, and a
//! log buffer. There is exactly one live checkpoint per run — no version history,
//! no branching timelines. That keeps resume semantics simple: restart from the
//! last thing this crate saved, or start fresh if nothing was ever saved.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use flowlang_checkpoint::{CheckpointState, CheckpointStore, FileCheckpointStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileCheckpointStore::new("./logs");
//!
//! match store.load().await? {
//!     Some(state) => println!("resuming from {}", state.current_node),
//!     None => println!("fresh run"),
//! }
//!
//! let state = CheckpointState::fresh("start", chrono::Utc::now());
//! store.save(&state).await?;
//! # Ok(())
//! # }
//! ```

mod checkpoint;
mod error;
mod file;
mod memory;
mod traits;

pub use checkpoint::CheckpointState;
pub use error::{CheckpointError, Result};
pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;
pub use traits::CheckpointStore;
