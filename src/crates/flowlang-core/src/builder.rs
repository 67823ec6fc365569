//! Lowers an [`AstGraph`] into a semantic [`Graph`] (§4.C).
//!
//! The build context threads two kinds of inherited state through nested scopes: the
//! node/edge attribute defaults declared so far, and the class list accumulated from
//! enclosing subgraphs. Entering a subgraph forks both (a shallow copy) so sibling
//! subgraphs never see each other's defaults.

use std::collections::HashMap;

use crate::ast::{AstAttrs, AstGraph, AstStatement, AstValue};
use crate::error::Result;
use crate::graph::{Graph, GraphEdge, GraphNode};

#[derive(Clone, Default)]
struct BuildContext {
    node_defaults: AstAttrs,
    edge_defaults: AstAttrs,
    inherited_classes: Vec<String>,
}

/// Lower a parsed AST into the compiled graph model.
pub fn build(ast: &AstGraph) -> Result<Graph> {
    let mut graph = Graph::new();
    let ctx = BuildContext::default();
    build_statements(&mut graph, &ast.statements, ctx)?;
    Ok(graph)
}

fn build_statements(graph: &mut Graph, statements: &[AstStatement], mut ctx: BuildContext) -> Result<()> {
    for stmt in statements {
        match stmt {
            AstStatement::GraphAttrDecl { key, value } => {
                apply_graph_attr_decl(graph, key, value);
            }
            AstStatement::GraphAttrBlock { attrs } => {
                for (key, value) in attrs {
                    apply_graph_attr_decl(graph, key, value);
                }
            }
            AstStatement::NodeDefaults { attrs } => {
                merge_attrs(&mut ctx.node_defaults, attrs);
            }
            AstStatement::EdgeDefaults { attrs } => {
                merge_attrs(&mut ctx.edge_defaults, attrs);
            }
            AstStatement::Node { id, attrs } => {
                let node = build_node(id, &ctx.node_defaults, attrs, &ctx.inherited_classes, graph.attrs.default_max_retry);
                graph.upsert_node(node);
            }
            AstStatement::Edge { chain, attrs } => {
                for pair in chain.windows(2) {
                    graph.ensure_node(&pair[0]);
                    graph.ensure_node(&pair[1]);
                    let edge = build_edge(&pair[0], &pair[1], &ctx.edge_defaults, attrs);
                    graph.edges.push(edge);
                }
            }
            AstStatement::Subgraph { id: _, body } => {
                let mut child = ctx.clone();
                if let Some(derived) = derive_subgraph_class(body) {
                    child.inherited_classes.push(derived);
                }
                build_statements(graph, body, child)?;
            }
        }
    }
    Ok(())
}

/// A subgraph derives a class from its own `label` graph-attribute: lowercase, spaces
/// to hyphens, strip anything outside `[a-z0-9-]`.
fn derive_subgraph_class(body: &[AstStatement]) -> Option<String> {
    for stmt in body {
        let label = match stmt {
            AstStatement::GraphAttrDecl { key, value } if key == "label" => Some(value.as_string()),
            AstStatement::GraphAttrBlock { attrs } => attrs
                .iter()
                .find(|(k, _)| k == "label")
                .map(|(_, v)| v.as_string()),
            _ => None,
        };
        if let Some(label) = label {
            let slug: String = label
                .to_lowercase()
                .chars()
                .map(|c| if c == ' ' { '-' } else { c })
                .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
                .collect();
            if !slug.is_empty() {
                return Some(slug);
            }
        }
    }
    None
}

fn apply_graph_attr_decl(graph: &mut Graph, key: &str, value: &AstValue) {
    let s = value.as_string();
    graph.attrs.raw.insert(key.to_string(), s.clone());
    match key {
        "goal" => graph.attrs.goal = Some(s),
        "label" => graph.attrs.label = Some(s),
        "modelStylesheet" | "model_stylesheet" => graph.attrs.model_stylesheet = Some(s),
        "defaultMaxRetry" | "default_max_retry" => {
            if let Some(n) = value.as_i64() {
                graph.attrs.default_max_retry = n.max(0) as u32;
            }
        }
        "retryTarget" | "retry_target" => graph.attrs.retry_target = Some(s),
        "fallbackRetryTarget" | "fallback_retry_target" => graph.attrs.fallback_retry_target = Some(s),
        "defaultFidelity" | "default_fidelity" => graph.attrs.default_fidelity = Some(s),
        "vars" => {
            for part in s.split(',') {
                let part = part.trim();
                if part.is_empty() {
                    continue;
                }
                if let Some((name, default)) = part.split_once('=') {
                    graph.attrs.vars.push((name.trim().to_string(), Some(default.trim().to_string())));
                } else {
                    graph.attrs.vars.push((part.to_string(), None));
                }
            }
        }
        _ => {}
    }
}

fn merge_attrs(into: &mut AstAttrs, from: &AstAttrs) {
    for (k, v) in from {
        if let Some(existing) = into.iter_mut().find(|(ek, _)| ek == k) {
            existing.1 = v.clone();
        } else {
            into.push((k.clone(), v.clone()));
        }
    }
}

fn merged_attr_map(defaults: &AstAttrs, explicit: &AstAttrs) -> HashMap<String, AstValue> {
    let mut map = HashMap::new();
    for (k, v) in defaults {
        map.insert(k.clone(), v.clone());
    }
    for (k, v) in explicit {
        map.insert(k.clone(), v.clone());
    }
    map
}

fn build_node(id: &str, defaults: &AstAttrs, explicit: &AstAttrs, inherited_classes: &[String], default_max_retry: u32) -> GraphNode {
    let map = merged_attr_map(defaults, explicit);
    let mut node = GraphNode::default_with_id(id);
    node.max_retries = default_max_retry;

    let mut explicit_classes = Vec::new();
    for (key, value) in &map {
        let s = value.as_string();
        node.attrs.insert(key.clone(), s.clone());
        match key.as_str() {
            "label" => node.label = Some(s),
            "shape" => node.shape = Some(s),
            "type" => node.node_type = Some(s),
            "prompt" => node.prompt = Some(s),
            "max_retries" | "maxRetries" => node.max_retries = value.as_i64().unwrap_or(0).max(0) as u32,
            "goal_gate" | "goalGate" => node.goal_gate = Some(s),
            "retry_target" | "retryTarget" => node.retry_target = Some(s),
            "fallback_retry_target" | "fallbackRetryTarget" => node.fallback_retry_target = Some(s),
            "fidelity" => node.fidelity = Some(s),
            "thread_id" | "threadId" => node.thread_id = Some(s),
            "class" => {
                explicit_classes = s.split(',').map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect();
            }
            "timeout" => node.timeout_ms = value.as_duration_ms(),
            "llm_model" | "llmModel" => node.llm_model = Some(s),
            "llm_provider" | "llmProvider" => node.llm_provider = Some(s),
            "reasoning_effort" | "reasoningEffort" => node.reasoning_effort = s,
            "auto_status" | "autoStatus" => node.auto_status = Some(s),
            "allow_partial" | "allowPartial" => node.allow_partial = value.as_bool(),
            _ => {}
        }
    }

    node.classes = inherited_classes.iter().cloned().chain(explicit_classes).collect();
    node
}

fn build_edge(from: &str, to: &str, defaults: &AstAttrs, explicit: &AstAttrs) -> GraphEdge {
    let map = merged_attr_map(defaults, explicit);
    let mut edge = GraphEdge {
        from_node: from.to_string(),
        to_node: to.to_string(),
        label: None,
        condition: None,
        weight: 0,
        fidelity: None,
        thread_id: None,
        loop_restart: false,
        attrs: HashMap::new(),
    };

    for (key, value) in &map {
        let s = value.as_string();
        edge.attrs.insert(key.clone(), s.clone());
        match key.as_str() {
            "label" => edge.label = Some(s),
            "condition" => edge.condition = Some(s),
            "weight" => edge.weight = value.as_i64().unwrap_or(0),
            "fidelity" => edge.fidelity = Some(s),
            "thread_id" | "threadId" => edge.thread_id = Some(s),
            "loop_restart" | "loopRestart" => edge.loop_restart = value.as_bool(),
            _ => {}
        }
    }

    edge
}
