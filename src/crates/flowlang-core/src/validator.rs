//! Graph validation (§4.D): a pass over the compiled [`Graph`] that emits diagnostics
//! rather than failing outright, so callers can decide how strict to be.

use crate::condition;
use crate::error::{GraphError, Result};
use crate::graph::Graph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub node_id: Option<String>,
    pub edge_id: Option<(String, String)>,
}

impl Diagnostic {
    fn error(code: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: code.to_string(),
            message: message.into(),
            node_id: None,
            edge_id: None,
        }
    }

    fn warning(code: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.to_string(),
            message: message.into(),
            node_id: None,
            edge_id: None,
        }
    }

    fn at_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    fn at_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edge_id = Some((from.into(), to.into()));
        self
    }
}

const RECOGNISED_FIDELITY_MODES: [&str; 6] = ["full", "truncate", "compact", "summary:low", "summary:medium", "summary:high"];

/// Walk the graph and return every diagnostic found; never fails.
pub fn validate(graph: &Graph) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let starts: Vec<_> = graph.nodes_in_order().filter(|n| n.shape.as_deref() == Some("Mdiamond")).collect();
    match starts.len() {
        0 => diagnostics.push(Diagnostic::error("NO_START", "graph has no start node (shape=Mdiamond)")),
        1 => {}
        _ => diagnostics.push(Diagnostic::error(
            "MULTIPLE_STARTS",
            format!("graph has {} start nodes, expected exactly one", starts.len()),
        )),
    }

    if graph.exit_nodes().is_empty() {
        diagnostics.push(Diagnostic::warning("NO_TERMINAL_REACHABLE", "graph has no terminal node (shape=Msquare)"));
    }

    for edge in &graph.edges {
        if graph.node(&edge.from_node).is_none() {
            diagnostics.push(
                Diagnostic::error("DANGLING_EDGE_SOURCE", format!("edge source '{}' is not a known node", edge.from_node))
                    .at_edge(&edge.from_node, &edge.to_node),
            );
        }
        if graph.node(&edge.to_node).is_none() {
            diagnostics.push(
                Diagnostic::error("DANGLING_EDGE_TARGET", format!("edge target '{}' is not a known node", edge.to_node))
                    .at_edge(&edge.from_node, &edge.to_node),
            );
        }

        if let Some(cond) = edge.condition.as_deref() {
            if !cond.trim().is_empty() {
                if let Some(reason) = condition::validate_syntax(cond) {
                    diagnostics.push(
                        Diagnostic::error("BAD_CONDITION", format!("condition '{cond}' is invalid: {reason}"))
                            .at_edge(&edge.from_node, &edge.to_node),
                    );
                }
            }
        }

        if let Some(mode) = edge.fidelity.as_deref() {
            if !mode.is_empty() && !RECOGNISED_FIDELITY_MODES.contains(&mode) {
                diagnostics.push(
                    Diagnostic::error("UNKNOWN_FIDELITY_MODE", format!("edge fidelity '{mode}' is not recognised"))
                        .at_edge(&edge.from_node, &edge.to_node),
                );
            }
        }
    }

    for node in graph.nodes_in_order() {
        if let Some(mode) = node.fidelity.as_deref() {
            if !mode.is_empty() && !RECOGNISED_FIDELITY_MODES.contains(&mode) {
                diagnostics.push(
                    Diagnostic::error("UNKNOWN_FIDELITY_MODE", format!("node fidelity '{mode}' is not recognised")).at_node(&node.id),
                );
            }
        }
        if let Some(ms) = node.timeout_ms {
            if ms < 0.0 {
                diagnostics.push(Diagnostic::error("NEGATIVE_TIMEOUT", "timeout must be non-negative").at_node(&node.id));
            }
        }
    }

    diagnostics
}

/// `validateOrRaise`: fail with the first `error`-severity diagnostic, if any.
pub fn validate_or_raise(graph: &Graph) -> Result<Vec<Diagnostic>> {
    let diagnostics = validate(graph);
    if let Some(first_error) = diagnostics.iter().find(|d| d.severity == Severity::Error) {
        tracing::error!(code = %first_error.code, message = %first_error.message, "graph validation failed");
        return Err(GraphError::validation(format!("[{}] {}", first_error.code, first_error.message)));
    }
    for warning in diagnostics.iter().filter(|d| d.severity == Severity::Warning) {
        tracing::warn!(code = %warning.code, message = %warning.message, "graph validation warning");
    }
    Ok(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn build_src(src: &str) -> Graph {
        build(&parse(&tokenize(src).unwrap()).unwrap()).unwrap()
    }

    #[test]
    fn missing_start_node_is_an_error() {
        let g = build_src("digraph G { A [shape=box] }");
        let diags = validate(&g);
        assert!(diags.iter().any(|d| d.code == "NO_START"));
    }

    #[test]
    fn multiple_start_nodes_is_an_error() {
        let g = build_src("digraph G { A [shape=Mdiamond]; B [shape=Mdiamond] }");
        let diags = validate(&g);
        assert!(diags.iter().any(|d| d.code == "MULTIPLE_STARTS"));
    }

    #[test]
    fn missing_terminal_node_is_a_warning() {
        let g = build_src("digraph G { A [shape=Mdiamond] }");
        let diags = validate(&g);
        let d = diags.iter().find(|d| d.code == "NO_TERMINAL_REACHABLE").unwrap();
        assert_eq!(d.severity, Severity::Warning);
    }

    #[test]
    fn bad_condition_syntax_is_reported() {
        let g = build_src("digraph G { A [shape=Mdiamond]; B [shape=box]; end [shape=Msquare]; A -> B [condition=\"= foo\"]; B -> end }");
        let diags = validate(&g);
        assert!(diags.iter().any(|d| d.code == "BAD_CONDITION"));
    }

    #[test]
    fn well_formed_linear_graph_has_no_errors() {
        let g = build_src("digraph G { start [shape=Mdiamond]; A [shape=box]; end [shape=Msquare]; start -> A -> end }");
        let diags = validate(&g);
        assert!(diags.iter().all(|d| d.severity != Severity::Error));
    }

    #[test]
    fn validate_or_raise_surfaces_the_first_error() {
        let g = build_src("digraph G { A [shape=box] }");
        let err = validate_or_raise(&g).unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn unrecognised_fidelity_mode_is_an_error() {
        let g = build_src("digraph G { start [shape=Mdiamond]; A [shape=box, fidelity=nonsense]; end [shape=Msquare]; start -> A -> end }");
        let diags = validate(&g);
        assert!(diags.iter().any(|d| d.code == "UNKNOWN_FIDELITY_MODE"));
    }
}
