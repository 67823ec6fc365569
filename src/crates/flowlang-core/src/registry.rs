//! Handler registry (§4.L): a keyed map populated at construction, plus a fixed
//! shape→type lookup table. No runtime type introspection — dispatch is always by
//! looking a string up in a map.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::condition;
use crate::context::Context;
use crate::error::Result;
use crate::graph::{GraphNode, Outcome};

/// `type` attribute (if registered) first, else shape→type, else this.
pub const DEFAULT_HANDLER_TYPE: &str = "codergen";

fn shape_to_handler_type(shape: &str) -> Option<&'static str> {
    match shape {
        "Mdiamond" => Some("start"),
        "Msquare" => Some("exit"),
        "box" => Some("codergen"),
        "hexagon" => Some("wait.human"),
        "diamond" => Some("conditional"),
        "component" => Some("parallel"),
        "tripleoctagon" => Some("parallel.fan_in"),
        "parallelogram" => Some("tool"),
        "house" => Some("stack.manager_loop"),
        _ => None,
    }
}

/// Everything a handler needs besides the node and context: the capabilities it
/// may call out to. Each is optional — a handler that needs one but doesn't find
/// it reports `HANDLER_FATAL`.
#[derive(Clone, Default)]
pub struct Services {
    pub codergen: Option<Arc<dyn CodergenBackend>>,
    pub interviewer: Option<Arc<dyn Interviewer>>,
    pub execution_environment: Option<Arc<dyn ExecutionEnvironment>>,
}

/// A handler's contract: run a node against the projected context and produce an
/// outcome. Implementations must not block the executor thread; use `async`.
///
/// `thread_key` is the session-reuse identifier the runner resolved for this node via
/// [`crate::fidelity::resolve_thread_key`]; only `codergen` currently forwards it
/// anywhere (onto [`NodeMeta`]), but it's passed to every handler for uniformity.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn run(&self, node: &GraphNode, context: &Context, thread_key: &str, services: &Services) -> Result<Outcome>;
}

/// Keyed map of handler-type name to implementation, with the shape→type fallback
/// table baked in at resolution time.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        let mut registry = Self { handlers: HashMap::new() };
        registry.register("start", Arc::new(StartHandler));
        registry.register("exit", Arc::new(ExitHandler));
        registry.register("conditional", Arc::new(ConditionalHandler));
        registry.register("codergen", Arc::new(CodergenHandler));
        registry.register("wait.human", Arc::new(WaitHumanHandler));
        registry.register("tool", Arc::new(ToolHandler));
        registry.register("stack.manager_loop", Arc::new(StackManagerLoopHandler));
        registry
    }

    pub fn register(&mut self, handler_type: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(handler_type.into(), handler);
    }

    /// §4.L resolution: explicit `type` attr → shape table → default. Returns the
    /// type name regardless of whether anything is registered under it — `parallel`
    /// and `parallel.fan_in` resolve here but are driven by the runner directly
    /// rather than through a registered [`Handler`].
    pub fn resolve_type<'a>(&self, node: &'a GraphNode) -> std::borrow::Cow<'a, str> {
        if let Some(explicit) = node.node_type.as_deref() {
            return std::borrow::Cow::Borrowed(explicit);
        }
        if let Some(shape) = node.shape.as_deref() {
            if let Some(mapped) = shape_to_handler_type(shape) {
                return std::borrow::Cow::Borrowed(mapped);
            }
        }
        std::borrow::Cow::Borrowed(DEFAULT_HANDLER_TYPE)
    }

    pub fn get(&self, handler_type: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(handler_type).cloned()
    }

    /// Resolve and fetch in one step.
    pub fn resolve(&self, node: &GraphNode) -> Option<Arc<dyn Handler>> {
        self.get(&self.resolve_type(node))
    }
}

struct StartHandler;
#[async_trait]
impl Handler for StartHandler {
    async fn run(&self, _node: &GraphNode, _context: &Context, _thread_key: &str, _services: &Services) -> Result<Outcome> {
        Ok(Outcome::success())
    }
}

struct ExitHandler;
#[async_trait]
impl Handler for ExitHandler {
    async fn run(&self, _node: &GraphNode, _context: &Context, _thread_key: &str, _services: &Services) -> Result<Outcome> {
        Ok(Outcome::success())
    }
}

/// Computes nothing beyond success; the runner drives condition-based selection
/// from the node's outgoing edges regardless of which handler ran.
struct ConditionalHandler;
#[async_trait]
impl Handler for ConditionalHandler {
    async fn run(&self, _node: &GraphNode, _context: &Context, _thread_key: &str, _services: &Services) -> Result<Outcome> {
        Ok(Outcome::success())
    }
}

struct CodergenHandler;
#[async_trait]
impl Handler for CodergenHandler {
    async fn run(&self, node: &GraphNode, context: &Context, thread_key: &str, services: &Services) -> Result<Outcome> {
        let backend = services
            .codergen
            .as_ref()
            .ok_or_else(|| crate::error::GraphError::handler_fatal(&node.id, "no codergen backend registered"))?;
        let prompt = node.prompt.clone().unwrap_or_default();
        let meta = NodeMeta {
            id: node.id.clone(),
            label: node.label.clone(),
            goal_gate: node.goal_gate.clone(),
            thread_key: thread_key.to_string(),
        };
        backend.run(&prompt, &context.snapshot_ordered(), &meta).await
    }
}

struct WaitHumanHandler;
#[async_trait]
impl Handler for WaitHumanHandler {
    async fn run(&self, node: &GraphNode, _context: &Context, _thread_key: &str, services: &Services) -> Result<Outcome> {
        let interviewer = services
            .interviewer
            .as_ref()
            .ok_or_else(|| crate::error::GraphError::handler_fatal(&node.id, "no interviewer registered"))?;
        let question = Question {
            kind: QuestionKind::Confirmation,
            prompt: node.prompt.clone().unwrap_or_default(),
            options: Vec::new(),
        };
        let answer = interviewer.ask(question).await?;
        Ok(match answer.value {
            AnswerValue::Yes | AnswerValue::Custom(_) => Outcome::success(),
            AnswerValue::No => Outcome::fail("human declined"),
            AnswerValue::Skipped => Outcome {
                status: Some(crate::graph::OutcomeStatus::Skipped),
                ..Outcome::success()
            },
        })
    }
}

struct ToolHandler;
#[async_trait]
impl Handler for ToolHandler {
    async fn run(&self, node: &GraphNode, _context: &Context, _thread_key: &str, services: &Services) -> Result<Outcome> {
        let env = services
            .execution_environment
            .as_ref()
            .ok_or_else(|| crate::error::GraphError::handler_fatal(&node.id, "no execution environment registered"))?;
        let command = node
            .attrs
            .get("tool_command")
            .cloned()
            .ok_or_else(|| crate::error::GraphError::handler_fatal(&node.id, "tool node missing tool_command"))?;
        let pre_hook = node.attrs.get("pre_hook").map(String::as_str);
        let post_hook = node.attrs.get("post_hook").map(String::as_str);
        env.run_command(&command, pre_hook, post_hook).await
    }
}

/// Re-invokes a sub-graph cycle by cycle, polling the child's reported status/outcome
/// from context rather than driving the sub-graph itself, until `goal_gate` is
/// satisfied or `manager_max_cycles` is exhausted.
///
/// Per-cycle child status comes from `stack.child.status_sequence`/`outcome_sequence`
/// (one entry per cycle) if present, else the single `stack.child.status`/`outcome`
/// keys for a child that reports only its latest state.
struct StackManagerLoopHandler;
#[async_trait]
impl Handler for StackManagerLoopHandler {
    async fn run(&self, node: &GraphNode, context: &Context, _thread_key: &str, _services: &Services) -> Result<Outcome> {
        let max_cycles = node
            .attrs
            .get("manager_max_cycles")
            .or_else(|| node.attrs.get("manager.max_cycles"))
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(1000)
            .max(1);
        let goal_gate = node.goal_gate.as_deref().unwrap_or("").trim();
        let snapshot = context.snapshot();

        for cycle in 1..=max_cycles {
            let status = child_field_at_cycle(&snapshot, "status", cycle);
            let outcome = child_field_at_cycle(&snapshot, "outcome", cycle);
            if status.as_deref() == Some("completed") && outcome.as_deref() == Some("success") {
                return Ok(manager_success(cycle, "child completed"));
            }
            if status.as_deref() == Some("failed") {
                return Ok(Outcome::fail("stack.manager_loop: child failed"));
            }

            if !goal_gate.is_empty() {
                let marker = Outcome::success();
                if condition::evaluate_str(goal_gate, &marker, &snapshot) {
                    return Ok(manager_success(cycle, "goal gate satisfied"));
                }
            }
        }

        Ok(Outcome::fail("stack.manager_loop: manager_max_cycles exceeded"))
    }
}

fn manager_success(cycle: usize, note: &str) -> Outcome {
    let mut outcome = Outcome::success();
    outcome
        .context_updates
        .insert("stack.manager.cycles".to_string(), serde_json::Value::from(cycle as u64));
    outcome.notes = Some(note.to_string());
    outcome
}

fn child_field_at_cycle(snapshot: &HashMap<String, serde_json::Value>, field: &str, cycle: usize) -> Option<String> {
    let sequence_key = format!("stack.child.{field}_sequence");
    if let Some(value) = snapshot
        .get(&sequence_key)
        .and_then(serde_json::Value::as_array)
        .and_then(|entries| entries.get(cycle.saturating_sub(1)))
        .and_then(serde_json::Value::as_str)
    {
        return Some(value.to_string());
    }
    snapshot.get(&format!("stack.child.{field}")).and_then(serde_json::Value::as_str).map(str::to_string)
}

/// Node metadata handed to [`CodergenBackend::run`] alongside the projected context.
#[derive(Debug, Clone)]
pub struct NodeMeta {
    pub id: String,
    pub label: Option<String>,
    pub goal_gate: Option<String>,
    /// Session-reuse identifier resolved by [`crate::fidelity::resolve_thread_key`];
    /// stateful backends use this to reattach to a prior session under full fidelity.
    pub thread_key: String,
}

#[async_trait]
pub trait CodergenBackend: Send + Sync {
    async fn run(&self, prompt: &str, projected_context: &[(String, serde_json::Value)], node_meta: &NodeMeta) -> Result<Outcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    YesNo,
    Confirmation,
    MultipleChoice,
    Freeform,
}

#[derive(Debug, Clone)]
pub struct Question {
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnswerValue {
    Yes,
    No,
    Skipped,
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub value: AnswerValue,
    pub selected_option: Option<String>,
}

#[async_trait]
pub trait Interviewer: Send + Sync {
    async fn ask(&self, question: Question) -> Result<Answer>;
}

#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    /// `pre_hook`/`post_hook` are the node's hook commands, already `$NAME`-expanded
    /// by the variable-expansion transform; `None` when the node declares neither.
    async fn run_command(&self, command: &str, pre_hook: Option<&str>, post_hook: Option<&str>) -> Result<Outcome>;
}
