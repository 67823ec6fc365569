//! Typed AST produced by the parser, before the builder lowers it into a [`crate::graph::Graph`].
//!
//! The shapes here mirror §3/§4.B directly: attribute values are a tagged union, and
//! top-level statements are a tagged union over the handful of things that can appear
//! inside a `digraph { ... }` body.

use std::collections::HashMap;

/// A single attribute value as it came off the lexer, before any typed field plucking.
#[derive(Debug, Clone, PartialEq)]
pub enum AstValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    /// `(milliseconds, raw unit suffix, raw token text)`.
    Duration(f64, String, String),
    Identifier(String),
}

impl AstValue {
    /// Render the value back to the string form attribute consumers expect, regardless
    /// of its original literal kind.
    pub fn as_string(&self) -> String {
        match self {
            AstValue::String(s) => s.clone(),
            AstValue::Integer(i) => i.to_string(),
            AstValue::Float(f) => f.to_string(),
            AstValue::Boolean(b) => b.to_string(),
            AstValue::Duration(_, _, raw) => raw.clone(),
            AstValue::Identifier(s) => s.clone(),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            AstValue::Boolean(b) => *b,
            AstValue::String(s) | AstValue::Identifier(s) => s == "true",
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AstValue::Integer(i) => Some(*i),
            AstValue::Float(f) => Some(*f as i64),
            AstValue::String(s) | AstValue::Identifier(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_duration_ms(&self) -> Option<f64> {
        match self {
            AstValue::Duration(ms, _, _) => Some(*ms),
            AstValue::Integer(i) => Some(*i as f64),
            AstValue::Float(f) => Some(*f),
            AstValue::String(s) | AstValue::Identifier(s) => s.parse().ok(),
            _ => None,
        }
    }
}

/// An ordered attribute list as written in source (`[k=v, k2=v2]`). Order is preserved
/// because later occurrences of the same key override earlier ones during merge.
pub type AstAttrs = Vec<(String, AstValue)>;

/// One statement inside a graph or subgraph body.
#[derive(Debug, Clone, PartialEq)]
pub enum AstStatement {
    /// `id [attrs]` — an explicit node declaration.
    Node { id: String, attrs: AstAttrs },
    /// `a -> b -> c [attrs]` — a chain of at least two ids, expanded pairwise by the
    /// builder into one edge per adjacent pair, each carrying a copy of `attrs`.
    Edge { chain: Vec<String>, attrs: AstAttrs },
    /// `graph [attrs]` — bulk graph-level attributes.
    GraphAttrBlock { attrs: AstAttrs },
    /// `node [attrs]` — defaults inherited by every node declared afterward in this scope.
    NodeDefaults { attrs: AstAttrs },
    /// `edge [attrs]` — defaults inherited by every edge declared afterward in this scope.
    EdgeDefaults { attrs: AstAttrs },
    /// `key = value` at statement level, outside an attribute list.
    GraphAttrDecl { key: String, value: AstValue },
    /// `subgraph id? { ... }`, recursively containing the same statement shapes.
    Subgraph {
        id: Option<String>,
        body: Vec<AstStatement>,
    },
}

/// The parsed form of one source file: `digraph <id> { <statements> }`.
#[derive(Debug, Clone, PartialEq)]
pub struct AstGraph {
    pub id: String,
    pub statements: Vec<AstStatement>,
}

/// Convenience view over an `AstAttrs` list for callers that want map-like lookup
/// while still respecting last-write-wins order.
pub fn attrs_to_map(attrs: &AstAttrs) -> HashMap<String, AstValue> {
    let mut map = HashMap::with_capacity(attrs.len());
    for (k, v) in attrs {
        map.insert(k.clone(), v.clone());
    }
    map
}
