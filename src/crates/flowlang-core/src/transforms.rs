//! In-place graph rewrites applied after build, before validate (§4.E).
//!
//! A transform is any `fn(&mut Graph)`; the engine applies a fixed, declared order.
//! The only transform the spec names is variable expansion: `$NAME` tokens inside a
//! small set of attribute values are replaced using the graph's `vars` list. Unresolved
//! variables are left intact rather than erroring — a transform never fails the build.

use crate::graph::Graph;

/// Attribute keys variable expansion is allowed to rewrite.
const EXPANDABLE_ATTRS: [&str; 3] = ["tool_command", "pre_hook", "post_hook"];

/// Apply every registered transform to `graph`, in order.
pub fn apply_all(graph: &mut Graph) {
    expand_variables(graph);
}

/// Replace `$NAME` occurrences in [`EXPANDABLE_ATTRS`] node attributes using the
/// graph's declared `vars` list (name -> optional default). A variable with no
/// configured value and no default is left as `$NAME` in the output.
pub fn expand_variables(graph: &mut Graph) {
    let values: Vec<(String, Option<String>)> = graph.attrs.vars.clone();

    for node in graph.nodes.values_mut() {
        for key in EXPANDABLE_ATTRS {
            if let Some(current) = node.attrs.get(key).cloned() {
                let expanded = expand_one(&current, &values);
                node.attrs.insert(key.to_string(), expanded);
            }
        }
    }
}

fn expand_one(text: &str, vars: &[(String, Option<String>)]) -> String {
    let mut out = text.to_string();
    for (name, default) in vars {
        let needle = format!("${name}");
        if out.contains(&needle) {
            if let Some(value) = default {
                out = out.replace(&needle, value);
            }
        }
    }
    out
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
    fn expands_known_variable_with_default() {
        let mut g = build_src("digraph G { vars=\"MODEL=gpt-4\"; A [tool_command=\"run $MODEL\"] }");
        apply_all(&mut g);
        assert_eq!(g.node("A").unwrap().attrs["tool_command"], "run gpt-4");
    }

    #[test]
    fn unresolved_variable_without_default_is_left_intact() {
        let mut g = build_src("digraph G { vars=\"API_KEY\"; A [tool_command=\"key=$API_KEY\"] }");
        apply_all(&mut g);
        assert_eq!(g.node("A").unwrap().attrs["tool_command"], "key=$API_KEY");
    }

    #[test]
    fn non_expandable_attributes_are_untouched() {
        let mut g = build_src("digraph G { vars=\"MODEL=gpt-4\"; A [prompt=\"uses $MODEL\"] }");
        apply_all(&mut g);
        assert_eq!(g.node("A").unwrap().attrs["prompt"], "uses $MODEL");
    }
}
