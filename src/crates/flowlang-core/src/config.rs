//! Runner-wide configuration (§4.P): where checkpoints and artifacts live, the
//! default retry preset and fidelity mode, and the event emitter's queue size.
//!
//! There is no file-based config format or environment-variable layer here — the
//! embedding application builds an `EngineConfig` however it likes and hands it to
//! the runner, the same division of responsibility as the handler capabilities.

use std::path::PathBuf;

const DEFAULT_ARTIFACT_INLINE_THRESHOLD_BYTES: usize = 100 * 1024;
const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub logs_root: Option<PathBuf>,
    pub artifact_inline_threshold_bytes: usize,
    pub default_retry_preset: String,
    pub default_fidelity: String,
    pub event_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            logs_root: None,
            artifact_inline_threshold_bytes: DEFAULT_ARTIFACT_INLINE_THRESHOLD_BYTES,
            default_retry_preset: "standard".to_string(),
            default_fidelity: "compact".to_string(),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logs_root(mut self, logs_root: impl Into<PathBuf>) -> Self {
        self.logs_root = Some(logs_root.into());
        self
    }

    pub fn with_artifact_inline_threshold(mut self, bytes: usize) -> Self {
        self.artifact_inline_threshold_bytes = bytes;
        self
    }

    pub fn with_default_retry_preset(mut self, preset: impl Into<String>) -> Self {
        self.default_retry_preset = preset.into();
        self
    }

    pub fn with_default_fidelity(mut self, mode: impl Into<String>) -> Self {
        self.default_fidelity = mode.into();
        self
    }

    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }

    /// Where `checkpoint.json` lives for this run, if a `logs_root` was configured.
    pub fn checkpoint_path(&self) -> Option<PathBuf> {
        self.logs_root.as_ref().map(|root| root.join("checkpoint.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.logs_root, None);
        assert_eq!(config.artifact_inline_threshold_bytes, 100 * 1024);
        assert_eq!(config.default_retry_preset, "standard");
        assert_eq!(config.default_fidelity, "compact");
        assert_eq!(config.event_queue_capacity, 256);
    }

    #[test]
    fn builder_methods_override_one_field_at_a_time() {
        let config = EngineConfig::new()
            .with_logs_root("/tmp/run-1")
            .with_artifact_inline_threshold(4096)
            .with_default_retry_preset("aggressive")
            .with_default_fidelity("truncate")
            .with_event_queue_capacity(16);

        assert_eq!(config.logs_root, Some(PathBuf::from("/tmp/run-1")));
        assert_eq!(config.artifact_inline_threshold_bytes, 4096);
        assert_eq!(config.default_retry_preset, "aggressive");
        assert_eq!(config.default_fidelity, "truncate");
        assert_eq!(config.event_queue_capacity, 16);
    }

    #[test]
    fn checkpoint_path_is_none_without_a_logs_root() {
        assert_eq!(EngineConfig::new().checkpoint_path(), None);
    }

    #[test]
    fn checkpoint_path_joins_logs_root_with_the_fixed_filename() {
        let config = EngineConfig::new().with_logs_root("/var/run/pipeline");
        assert_eq!(config.checkpoint_path(), Some(PathBuf::from("/var/run/pipeline/checkpoint.json")));
    }
}
