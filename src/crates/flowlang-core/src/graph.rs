//! The semantic graph model (§3): typed nodes and edges, graph-level attributes, and
//! the outcome value a handler hands back to the runner.
//!
//! This is what the builder (§4.C) lowers an [`crate::ast::AstGraph`] into, and what
//! the validator (§4.D), condition language (§4.F), and edge selector (§4.G) all
//! operate on downstream.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Graph-level attributes: the handful of typed fields the compiler cares about, plus
/// the raw attribute map for anything a handler wants that isn't promoted to a field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphAttrs {
    pub goal: Option<String>,
    pub label: Option<String>,
    pub model_stylesheet: Option<String>,
    pub default_max_retry: u32,
    pub retry_target: Option<String>,
    pub fallback_retry_target: Option<String>,
    pub default_fidelity: Option<String>,
    pub vars: Vec<(String, Option<String>)>,
    pub raw: HashMap<String, String>,
}

impl GraphAttrs {
    pub fn new() -> Self {
        Self {
            default_max_retry: 50,
            ..Default::default()
        }
    }
}

/// One stage in the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub label: Option<String>,
    pub shape: Option<String>,
    pub node_type: Option<String>,
    pub prompt: Option<String>,
    pub max_retries: u32,
    pub goal_gate: Option<String>,
    pub retry_target: Option<String>,
    pub fallback_retry_target: Option<String>,
    pub fidelity: Option<String>,
    pub thread_id: Option<String>,
    pub classes: Vec<String>,
    /// Milliseconds, or `None` if unset/unparseable.
    pub timeout_ms: Option<f64>,
    pub llm_model: Option<String>,
    pub llm_provider: Option<String>,
    pub reasoning_effort: String,
    pub auto_status: Option<String>,
    pub allow_partial: bool,
    pub attrs: HashMap<String, String>,
}

impl GraphNode {
    pub fn default_with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            shape: None,
            node_type: None,
            prompt: None,
            max_retries: 0,
            goal_gate: None,
            retry_target: None,
            fallback_retry_target: None,
            fidelity: None,
            thread_id: None,
            classes: Vec::new(),
            timeout_ms: None,
            llm_model: None,
            llm_provider: None,
            reasoning_effort: "high".to_string(),
            auto_status: None,
            allow_partial: false,
            attrs: HashMap::new(),
        }
    }
}

/// A transition between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub from_node: String,
    pub to_node: String,
    pub label: Option<String>,
    pub condition: Option<String>,
    pub weight: i64,
    pub fidelity: Option<String>,
    pub thread_id: Option<String>,
    pub loop_restart: bool,
    pub attrs: HashMap<String, String>,
}

/// Status a handler's run produced. `retry` and `fail` drive the runner's attempt
/// loop; every other value feeds straight into edge selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    PartialSuccess,
    Retry,
    Fail,
    Skipped,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::PartialSuccess => "partial_success",
            OutcomeStatus::Retry => "retry",
            OutcomeStatus::Fail => "fail",
            OutcomeStatus::Skipped => "skipped",
        }
    }
}

/// What a handler hands back to the runner after executing one node.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub status: Option<OutcomeStatus>,
    pub preferred_label: Option<String>,
    pub suggested_next_ids: Vec<String>,
    pub context_updates: HashMap<String, Value>,
    pub notes: Option<String>,
    pub failure_reason: Option<String>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            status: Some(OutcomeStatus::Success),
            ..Default::default()
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            status: Some(OutcomeStatus::Fail),
            failure_reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn retry(reason: impl Into<String>) -> Self {
        Self {
            status: Some(OutcomeStatus::Retry),
            failure_reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn status_str(&self) -> &'static str {
        self.status.map(|s| s.as_str()).unwrap_or("")
    }
}

/// The compiled, in-memory pipeline graph: nodes keyed by id in creation order, an
/// ordered edge list, and graph-level attributes.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub ids: Vec<String>,
    pub nodes: HashMap<String, GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub attrs: GraphAttrs,
}

impl Graph {
    pub fn new() -> Self {
        Self {
            attrs: GraphAttrs::new(),
            ..Default::default()
        }
    }

    /// Insert a node if `id` is new, otherwise merge `node`'s fields over the existing
    /// one (explicit declarations always win over a default node materialised earlier
    /// from a bare edge endpoint).
    pub fn upsert_node(&mut self, node: GraphNode) {
        if !self.nodes.contains_key(&node.id) {
            self.ids.push(node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node);
    }

    /// Ensure `id` exists, inserting a bare default node if it does not.
    pub fn ensure_node(&mut self, id: &str) {
        if !self.nodes.contains_key(id) {
            self.ids.push(id.to_string());
            self.nodes.insert(id.to_string(), GraphNode::default_with_id(id));
        }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn nodes_in_order(&self) -> impl Iterator<Item = &GraphNode> {
        self.ids.iter().filter_map(move |id| self.nodes.get(id))
    }

    /// Outgoing edges of `node_id`, in the order they were declared.
    pub fn outgoing_edges(&self, node_id: &str) -> Vec<&GraphEdge> {
        self.edges.iter().filter(|e| e.from_node == node_id).collect()
    }

    pub fn start_node(&self) -> Option<&GraphNode> {
        self.nodes_in_order()
            .find(|n| n.shape.as_deref() == Some("Mdiamond"))
            .or_else(|| self.node("start"))
            .or_else(|| self.node("Start"))
    }

    pub fn exit_nodes(&self) -> Vec<&GraphNode> {
        self.nodes_in_order().filter(|n| n.shape.as_deref() == Some("Msquare")).collect()
    }
}
