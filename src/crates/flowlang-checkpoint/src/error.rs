//! Error types for checkpoint persistence.

use thiserror::Error;

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors raised while saving, loading, or validating a checkpoint.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// The checkpoint file exists but does not parse as the expected schema.
    #[error("checkpoint file is corrupt: {0}")]
    Corrupt(String),

    /// A checkpoint was found whose `currentNode` is not part of the graph being run.
    ///
    /// This can happen when a checkpoint from one graph definition is reused against
    /// an edited graph. Resuming from it would traverse to a node that no longer exists.
    #[error("checkpoint is stale: node '{0}' is not present in the current graph")]
    Stale(String),

    /// Underlying JSON (de)serialization failure.
    #[error("checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying filesystem failure while reading or writing the checkpoint file.
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),
}
