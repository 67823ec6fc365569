//! Deterministic edge selection (§4.G): given a node's outgoing edges, the current
//! outcome, and the running context, pick exactly one edge — or nothing, if the list
//! was empty to begin with.
//!
//! Five steps run in priority order; the first step that produces at least one
//! candidate decides the result, breaking ties only within that step.

use std::collections::HashMap;

use serde_json::Value;

use crate::condition;
use crate::graph::{GraphEdge, Outcome};

/// `A -> a->b->c(weight=0)`: highest weight wins, lexicographic target id breaks ties.
fn tie_break<'a>(edges: &[&'a GraphEdge]) -> Option<&'a GraphEdge> {
    edges
        .iter()
        .copied()
        .max_by(|a, b| a.weight.cmp(&b.weight).then_with(|| b.to_node.cmp(&a.to_node)))
}

/// Lowercase, trim, and strip a leading `[K] `, `K) `, or `K - ` prefix where `K` is a
/// single lowercase letter or digit — the label-normalisation rule edge selection's
/// preferred-label step relies on.
pub fn normalize_label(label: &str) -> String {
    let lowered = label.trim().to_lowercase();
    let prefixes_to_strip = |s: &str| -> Option<String> {
        let bytes = s.as_bytes();
        if bytes.len() >= 4 && bytes[0] == b'[' && bytes[2] == b']' && bytes[3] == b' ' {
            let k = bytes[1] as char;
            if k.is_ascii_lowercase() || k.is_ascii_digit() {
                return Some(s[4..].to_string());
            }
        }
        if bytes.len() >= 3 && bytes[1] == b')' && bytes[2] == b' ' {
            let k = bytes[0] as char;
            if k.is_ascii_lowercase() || k.is_ascii_digit() {
                return Some(s[3..].to_string());
            }
        }
        if bytes.len() >= 5 && bytes[1..4] == *b" - " {
            let k = bytes[0] as char;
            if k.is_ascii_lowercase() || k.is_ascii_digit() {
                return Some(s[4..].to_string());
            }
        }
        None
    };
    prefixes_to_strip(&lowered).unwrap_or(lowered).trim().to_string()
}

/// Run the five-step selection procedure. Returns `None` only when `edges` is empty.
pub fn select_edge<'a>(
    edges: &[&'a GraphEdge],
    outcome: &Outcome,
    context: &HashMap<String, Value>,
) -> Option<&'a GraphEdge> {
    if edges.is_empty() {
        return None;
    }

    // Step 1: condition match.
    let matching: Vec<&GraphEdge> = edges
        .iter()
        .copied()
        .filter(|e| {
            e.condition
                .as_deref()
                .map(|c| !c.trim().is_empty() && condition::evaluate_str(c, outcome, context))
                .unwrap_or(false)
        })
        .collect();
    if !matching.is_empty() {
        return tie_break(&matching);
    }

    // Step 2: preferred label.
    if let Some(preferred) = outcome.preferred_label.as_deref() {
        let target = normalize_label(preferred);
        if let Some(edge) = edges.iter().copied().find(|e| {
            e.label
                .as_deref()
                .map(|l| normalize_label(l) == target)
                .unwrap_or(false)
        }) {
            return Some(edge);
        }
    }

    // Step 3: suggested next ids, in order.
    for suggested in &outcome.suggested_next_ids {
        if let Some(edge) = edges.iter().copied().find(|e| &e.to_node == suggested) {
            return Some(edge);
        }
    }

    // Step 4: unconditional edges by weight.
    let unconditional: Vec<&GraphEdge> = edges
        .iter()
        .copied()
        .filter(|e| e.condition.as_deref().map(|c| c.trim().is_empty()).unwrap_or(true))
        .collect();
    if !unconditional.is_empty() {
        return tie_break(&unconditional);
    }

    // Step 5: fallback across everything.
    tie_break(edges)
}
