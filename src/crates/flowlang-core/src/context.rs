//! The traversal-scoped [`Context`] (§4.H, context half): a single-writer, ordered
//! key-value store plus an append-only log buffer, carried through one traversal.

use std::collections::HashMap;

use serde_json::Value;

/// Mutable state carried alongside a traversal. Owned exclusively by the traversal
/// that holds it — parallel branches work from independent [`Context::clone_deep`]
/// copies and the fan-in merges explicitly, never via shared mutable access.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: Vec<(String, Value)>,
    logs: Vec<String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some(entry) = self.values.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.values.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).cloned().unwrap_or(default)
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.iter().any(|(k, _)| k == key)
    }

    pub fn delete(&mut self, key: &str) -> Option<Value> {
        if let Some(pos) = self.values.iter().position(|(k, _)| k == key) {
            Some(self.values.remove(pos).1)
        } else {
            None
        }
    }

    /// Merge `updates` in insertion order; later keys in the same call win on
    /// conflict with earlier keys in that same call, and all of them win over
    /// whatever was previously set.
    pub fn apply_updates(&mut self, updates: impl IntoIterator<Item = (String, Value)>) {
        for (key, value) in updates {
            self.set(key, value);
        }
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// An owned, independent copy of the current key-value state, insertion order
    /// preserved. Used for checkpointing and fidelity projection.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.values.iter().cloned().collect()
    }

    /// Snapshot preserving insertion order, for callers (fidelity projection) that
    /// care about it.
    pub fn snapshot_ordered(&self) -> Vec<(String, Value)> {
        self.values.clone()
    }

    /// An independent `Context` seeded from this one's values, with its own empty
    /// log buffer — the copy parallel branches execute against.
    pub fn clone_deep(&self) -> Self {
        Self {
            values: self.values.clone(),
            logs: Vec::new(),
        }
    }

    /// Rebuild a `Context` from a previously captured snapshot (used on checkpoint
    /// resume). Order follows the iteration order of `snapshot`, which for a
    /// `HashMap` is unspecified — callers that need order preserved across a resume
    /// should prefer [`Context::from_ordered_snapshot`].
    pub fn from_snapshot(snapshot: HashMap<String, Value>) -> Self {
        Self {
            values: snapshot.into_iter().collect(),
            logs: Vec::new(),
        }
    }

    pub fn from_ordered_snapshot(snapshot: Vec<(String, Value)>) -> Self {
        Self {
            values: snapshot,
            logs: Vec::new(),
        }
    }
}
