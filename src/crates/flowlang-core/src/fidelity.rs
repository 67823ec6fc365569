//! Fidelity projection (§4.I): transform a context snapshot before handing it to a
//! handler, and resolve which fidelity mode and thread key apply to a given node/edge.

use serde_json::Value;

use crate::graph::{GraphEdge, GraphNode};

const TRUNCATE_LEN: usize = 1000;
const SUMMARY_LOW_LEN: usize = 0;
const SUMMARY_MEDIUM_LEN: usize = 100;
const SUMMARY_HIGH_LEN: usize = 500;

/// Project `snapshot` according to `mode`. Unrecognised or empty modes behave as `full`.
pub fn apply_fidelity(snapshot: &[(String, Value)], mode: &str) -> Vec<(String, Value)> {
    match mode {
        "full" => snapshot.to_vec(),
        "truncate" => snapshot.iter().map(|(k, v)| (k.clone(), truncate_value(v, TRUNCATE_LEN))).collect(),
        "compact" => snapshot
            .iter()
            .filter(|(k, _)| !k.starts_with("internal."))
            .map(|(k, v)| (k.clone(), truncate_value(v, TRUNCATE_LEN)))
            .collect(),
        "summary:low" => snapshot
            .iter()
            .map(|(k, _)| (k.clone(), summary_string(SUMMARY_LOW_LEN)))
            .collect(),
        "summary:medium" => snapshot
            .iter()
            .map(|(k, v)| (k.clone(), summarize_value(v, SUMMARY_MEDIUM_LEN)))
            .collect(),
        "summary:high" => snapshot
            .iter()
            .map(|(k, v)| (k.clone(), summarize_value(v, SUMMARY_HIGH_LEN)))
            .collect(),
        _ => snapshot.to_vec(),
    }
}

fn summary_string(_len: usize) -> Value {
    Value::String(String::new())
}

fn truncate_value(v: &Value, max_len: usize) -> Value {
    match v {
        Value::String(s) if s.chars().count() > max_len => {
            let truncated: String = s.chars().take(max_len).collect();
            Value::String(format!("{truncated}..."))
        }
        other => other.clone(),
    }
}

fn summarize_value(v: &Value, max_len: usize) -> Value {
    let stringified = match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if stringified.chars().count() > max_len {
        let truncated: String = stringified.chars().take(max_len).collect();
        Value::String(format!("{truncated}..."))
    } else {
        Value::String(stringified)
    }
}

const RECOGNISED_MODES: [&str; 6] = ["full", "truncate", "compact", "summary:low", "summary:medium", "summary:high"];

fn is_recognised(mode: &str) -> bool {
    RECOGNISED_MODES.contains(&mode)
}

/// First recognised mode among `edge.fidelity`, `node.fidelity`, `graph_default`, else
/// `"compact"`.
pub fn resolve_effective_fidelity(
    edge_fidelity: Option<&str>,
    node_fidelity: Option<&str>,
    graph_default: Option<&str>,
) -> String {
    [edge_fidelity, node_fidelity, graph_default]
        .into_iter()
        .flatten()
        .find(|m| is_recognised(m))
        .unwrap_or("compact")
        .to_string()
}

/// Options feeding [`resolve_thread_key`].
pub struct ThreadKeyContext<'a> {
    pub node: &'a GraphNode,
    pub edge: Option<&'a GraphEdge>,
    pub graph_default_thread: Option<&'a str>,
    pub previous_node_id: Option<&'a str>,
}

/// First non-empty of: node thread_id, edge thread_id, graph default thread, the
/// node's first subgraph class; else the previous node's id, else `"default"`.
pub fn resolve_thread_key(ctx: ThreadKeyContext) -> String {
    let candidates = [
        ctx.node.thread_id.as_deref(),
        ctx.edge.and_then(|e| e.thread_id.as_deref()),
        ctx.graph_default_thread,
        ctx.node.classes.first().map(|s| s.as_str()),
    ];
    for candidate in candidates.into_iter().flatten() {
        if !candidate.is_empty() {
            return candidate.to_string();
        }
    }
    ctx.previous_node_id.unwrap_or("default").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphNode;
    use serde_json::json;

    fn snapshot() -> Vec<(String, Value)> {
        vec![
            ("a".to_string(), json!("x".repeat(1500))),
            ("internal.secret".to_string(), json!("hidden")),
            ("n".to_string(), json!(42)),
        ]
    }

    #[test]
    fn full_mode_is_identity() {
        let projected = apply_fidelity(&snapshot(), "full");
        assert_eq!(projected, snapshot());
    }

    #[test]
    fn truncate_caps_long_strings() {
        let projected = apply_fidelity(&snapshot(), "truncate");
        let a = projected.iter().find(|(k, _)| k == "a").unwrap();
        if let Value::String(s) = &a.1 {
            assert!(s.ends_with("..."));
            assert_eq!(s.chars().count(), 1003);
        } else {
            panic!("expected string");
        }
    }

    #[test]
    fn compact_drops_internal_keys_then_truncates() {
        let projected = apply_fidelity(&snapshot(), "compact");
        assert!(projected.iter().all(|(k, _)| !k.starts_with("internal.")));
        assert_eq!(projected.len(), snapshot().len() - 1);
    }

    #[test]
    fn summary_low_blanks_every_value_but_keeps_keys() {
        let projected = apply_fidelity(&snapshot(), "summary:low");
        assert_eq!(projected.len(), snapshot().len());
        assert!(projected.iter().all(|(_, v)| v == &Value::String(String::new())));
    }

    #[test]
    fn summary_medium_and_high_stringify_and_truncate() {
        let medium = apply_fidelity(&snapshot(), "summary:medium");
        let a = medium.iter().find(|(k, _)| k == "a").unwrap();
        if let Value::String(s) = &a.1 {
            assert_eq!(s.chars().count(), 103);
        } else {
            panic!("expected string");
        }
    }

    #[test]
    fn unknown_mode_behaves_as_full() {
        assert_eq!(apply_fidelity(&snapshot(), "nonsense"), snapshot());
        assert_eq!(apply_fidelity(&snapshot(), ""), snapshot());
    }

    #[test]
    fn resolve_effective_fidelity_prefers_edge_then_node_then_graph() {
        assert_eq!(resolve_effective_fidelity(Some("full"), Some("truncate"), Some("compact")), "full");
        assert_eq!(resolve_effective_fidelity(None, Some("truncate"), Some("compact")), "truncate");
        assert_eq!(resolve_effective_fidelity(None, None, Some("compact")), "compact");
        assert_eq!(resolve_effective_fidelity(None, None, None), "compact");
        assert_eq!(resolve_effective_fidelity(Some("garbage"), Some("full"), None), "full");
    }

    #[test]
    fn resolve_thread_key_falls_back_through_candidates() {
        let mut node = GraphNode::default_with_id("n1");
        let key = resolve_thread_key(ThreadKeyContext {
            node: &node,
            edge: None,
            graph_default_thread: None,
            previous_node_id: Some("prev"),
        });
        assert_eq!(key, "prev");

        node.thread_id = Some("explicit".to_string());
        let key = resolve_thread_key(ThreadKeyContext {
            node: &node,
            edge: None,
            graph_default_thread: None,
            previous_node_id: Some("prev"),
        });
        assert_eq!(key, "explicit");
    }

    #[test]
    fn resolve_thread_key_defaults_to_default_string() {
        let node = GraphNode::default_with_id("n1");
        let key = resolve_thread_key(ThreadKeyContext {
            node: &node,
            edge: None,
            graph_default_thread: None,
            previous_node_id: None,
        });
        assert_eq!(key, "default");
    }
}
