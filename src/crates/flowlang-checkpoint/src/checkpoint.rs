//! The `CheckpointState` value: a complete, serializable snapshot of a traversal.
//!
//! A checkpoint captures everything the runner needs to resume a pipeline run from
//! the node after the last one it completed: which node it was standing on, which
//! nodes are already behind it, how many times each node has been retried, the full
//! context map, and the accumulated log buffer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A point-in-time snapshot of one pipeline traversal.
///
/// Field names match the on-disk JSON schema exactly (camelCase) so the checkpoint
/// file can be inspected or hand-edited without a translation layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointState {
    /// When this checkpoint was captured.
    pub timestamp: DateTime<Utc>,

    /// The node the traversal was on (or about to resume into) when saved.
    #[serde(rename = "currentNode")]
    pub current_node: String,

    /// Nodes already executed, in traversal order. Always a prefix of the eventual
    /// full traversal order.
    #[serde(rename = "completedNodes")]
    pub completed_nodes: Vec<String>,

    /// Per-node retry counters, keyed by node id.
    #[serde(rename = "nodeRetries")]
    pub node_retries: HashMap<String, u32>,

    /// The full context map at the moment of the snapshot.
    #[serde(rename = "context")]
    pub context: HashMap<String, Value>,

    /// Append-only human-readable log lines accumulated so far.
    pub logs: Vec<String>,
}

impl CheckpointState {
    /// Build a fresh checkpoint for a traversal about to start at `start_node`.
    pub fn fresh(start_node: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            current_node: start_node.into(),
            completed_nodes: Vec::new(),
            node_retries: HashMap::new(),
            context: HashMap::new(),
            logs: Vec::new(),
        }
    }

    /// Nodes skipped by resuming here rather than replaying the whole graph — i.e.
    /// every node already in `completed_nodes`.
    pub fn skipped_nodes(&self) -> &[String] {
        &self.completed_nodes
    }
}
