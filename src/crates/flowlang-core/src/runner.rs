//! The traversal state machine (§4.N): drives a compiled [`Graph`] from its start
//! node to a terminal one, handling retries, timeouts, parallel fan-out/fan-in, and
//! checkpoint persistence along the way.
//!
//! States: `Idle → Starting → Running(node) → AwaitingOutcome → Selecting →
//! {Running(next) | Terminating} → Done`. The implementation below collapses that
//! into a single `run` loop rather than an explicit state enum — each iteration of
//! the loop *is* one `Running → AwaitingOutcome → Selecting` cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use flowlang_checkpoint::{CheckpointState, CheckpointStore};

use crate::artifact::ArtifactStore;
use crate::condition;
use crate::config::EngineConfig;
use crate::context::Context;
use crate::error::{GraphError, Result};
use crate::events::{EventEmitter, EventReceiver, PipelineEvent};
use crate::fidelity;
use crate::graph::{Graph, GraphEdge, GraphNode, Outcome, OutcomeStatus};
use crate::registry::{HandlerRegistry, Services};
use crate::retry::{self, RetryPolicy};
use crate::selection;
use crate::validator::validate_or_raise;
use tracing::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Failed,
}

/// What a full traversal produces (§7): the outcome plus enough to see what ran.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub status: RunStatus,
    pub reason: Option<String>,
    pub completed_nodes: Vec<String>,
    pub last_node: Option<String>,
}

/// Drives one graph to completion. Cheap to clone — every field is an `Arc` (or,
/// for `EngineConfig`, plain data) — so parallel branches run against their own
/// clone rather than a shared reference, matching §5's "no global mutable state".
#[derive(Clone)]
pub struct Runner {
    graph: Arc<Graph>,
    registry: Arc<HandlerRegistry>,
    services: Services,
    config: EngineConfig,
    checkpoint_store: Arc<dyn CheckpointStore>,
    artifacts: Arc<ArtifactStore>,
    emitter: Arc<EventEmitter>,
}

impl Runner {
    pub fn new(graph: Graph, registry: HandlerRegistry, services: Services, config: EngineConfig, checkpoint_store: Arc<dyn CheckpointStore>) -> Self {
        let artifacts = Arc::new(ArtifactStore::new(config.artifact_inline_threshold_bytes, config.logs_root.clone()));
        let emitter = Arc::new(EventEmitter::new(config.event_queue_capacity));
        Self {
            graph: Arc::new(graph),
            registry: Arc::new(registry),
            services,
            config,
            checkpoint_store,
            artifacts,
            emitter,
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub async fn subscribe(&self) -> EventReceiver {
        self.emitter.subscribe().await
    }

    /// Run the graph to completion, resuming from a checkpoint if one is present.
    pub async fn run(&self) -> Result<RunResult> {
        validate_or_raise(&self.graph)?;

        let (mut context, mut node_retries, mut completed_nodes, mut current_id) = match self.checkpoint_store.load().await? {
            Some(state) => {
                if self.graph.node(&state.current_node).is_none() {
                    return Err(flowlang_checkpoint::CheckpointError::Stale(format!(
                        "checkpoint's current node '{}' is not present in this graph",
                        state.current_node
                    ))
                    .into());
                }
                self.emitter
                    .emit(PipelineEvent::CheckpointResumed {
                        timestamp: Utc::now(),
                        resumed_from_node: state.current_node.clone(),
                        skipped_nodes: state.completed_nodes.clone(),
                    })
                    .await;
                (
                    Context::from_snapshot(state.context.clone()),
                    state.node_retries.clone(),
                    state.completed_nodes.clone(),
                    state.current_node.clone(),
                )
            }
            None => {
                let start = self
                    .graph
                    .start_node()
                    .ok_or_else(|| GraphError::validation("graph has no start node"))?;
                (Context::new(), HashMap::new(), Vec::new(), start.id.clone())
            }
        };

        self.emitter
            .emit(PipelineEvent::PipelineStarted {
                timestamp: Utc::now(),
                start_node: current_id.clone(),
            })
            .await;

        let mut stage_index = completed_nodes.len();
        let mut incoming_edge: Option<GraphEdge> = None;
        let mut previous_node_id: Option<String> = None;

        loop {
            let node = self
                .graph
                .node(&current_id)
                .cloned()
                .ok_or_else(|| GraphError::build(format!("traversal reached unknown node '{current_id}'")))?;
            let handler_type = self.registry.resolve_type(&node).into_owned();

            if handler_type == "exit" {
                self.emitter
                    .emit(PipelineEvent::StageStarted {
                        timestamp: Utc::now(),
                        name: node.id.clone(),
                        index: stage_index,
                    })
                    .await;
                self.emitter
                    .emit(PipelineEvent::StageCompleted { timestamp: Utc::now(), name: node.id.clone() })
                    .await;
                completed_nodes.push(node.id.clone());
                self.save_checkpoint(&node.id, &context, &node_retries, &completed_nodes).await;
                self.emitter
                    .emit(PipelineEvent::PipelineCompleted { timestamp: Utc::now(), last_node: node.id.clone() })
                    .await;
                return Ok(RunResult {
                    status: RunStatus::Completed,
                    reason: None,
                    completed_nodes,
                    last_node: Some(node.id),
                });
            }

            let outcome = if handler_type == "parallel" {
                let (outcome, branch_completed) = self.run_parallel_region(&node, &mut context, &mut node_retries, stage_index).await?;
                completed_nodes.extend(branch_completed);
                outcome
            } else {
                self.run_node_with_retry(
                    &node,
                    incoming_edge.as_ref(),
                    previous_node_id.as_deref(),
                    &mut context,
                    &mut node_retries,
                    stage_index,
                )
                .await?
            };
            stage_index += 1;
            completed_nodes.push(node.id.clone());
            self.save_checkpoint(&node.id, &context, &node_retries, &completed_nodes).await;

            if outcome.status == Some(OutcomeStatus::Fail) {
                let reason = outcome.failure_reason.clone().unwrap_or_else(|| "node failed".to_string());
                self.emitter
                    .emit(PipelineEvent::PipelineFailed { timestamp: Utc::now(), reason: reason.clone() })
                    .await;
                return Ok(RunResult {
                    status: RunStatus::Failed,
                    reason: Some(reason),
                    completed_nodes,
                    last_node: Some(node.id),
                });
            }

            let outgoing = self.graph.outgoing_edges(&node.id);
            match selection::select_edge(&outgoing, &outcome, &context.snapshot()) {
                None => {
                    self.emitter
                        .emit(PipelineEvent::PipelineFailed {
                            timestamp: Utc::now(),
                            reason: "no_next_edge".to_string(),
                        })
                        .await;
                    return Ok(RunResult {
                        status: RunStatus::Failed,
                        reason: Some("no_next_edge".to_string()),
                        completed_nodes,
                        last_node: Some(node.id),
                    });
                }
                Some(edge) => {
                    if edge.loop_restart {
                        node_retries.insert(edge.to_node.clone(), 0);
                        self.emitter
                            .emit(PipelineEvent::LoopRestarted {
                                timestamp: Utc::now(),
                                from: node.id.clone(),
                                to: edge.to_node.clone(),
                            })
                            .await;
                    }
                    previous_node_id = Some(node.id.clone());
                    current_id = edge.to_node.clone();
                    incoming_edge = Some(edge.clone());
                }
            }
        }
    }

    /// Steps 1-5 of §4.N's per-node execution for a single (non-parallel) node:
    /// project fidelity, run the attempt loop, apply context updates. Mutates
    /// `context` in place and returns the final outcome for edge selection.
    async fn run_node_with_retry(
        &self,
        node: &GraphNode,
        incoming_edge: Option<&GraphEdge>,
        previous_node_id: Option<&str>,
        context: &mut Context,
        node_retries: &mut HashMap<String, u32>,
        stage_index: usize,
    ) -> Result<Outcome> {
        let handler_type = self.registry.resolve_type(node);
        let span = tracing::info_span!(
            "node",
            node_id = %node.id,
            handler_type = %handler_type,
            attempt = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );
        self.run_node_with_retry_body(node, incoming_edge, previous_node_id, context, node_retries, stage_index)
            .instrument(span)
            .await
    }

    async fn run_node_with_retry_body(
        &self,
        node: &GraphNode,
        incoming_edge: Option<&GraphEdge>,
        previous_node_id: Option<&str>,
        context: &mut Context,
        node_retries: &mut HashMap<String, u32>,
        stage_index: usize,
    ) -> Result<Outcome> {
        self.emitter
            .emit(PipelineEvent::StageStarted {
                timestamp: Utc::now(),
                name: node.id.clone(),
                index: stage_index,
            })
            .await;

        let effective_fidelity = fidelity::resolve_effective_fidelity(
            incoming_edge.and_then(|e| e.fidelity.as_deref()),
            node.fidelity.as_deref(),
            self.graph.attrs.default_fidelity.as_deref(),
        );
        let projected = fidelity::apply_fidelity(&context.snapshot_ordered(), &effective_fidelity);
        let projected_context = Context::from_ordered_snapshot(projected);

        let thread_key = fidelity::resolve_thread_key(fidelity::ThreadKeyContext {
            node,
            edge: incoming_edge,
            graph_default_thread: None,
            previous_node_id,
        });

        let policy = RetryPolicy::for_node_max_retries(node.max_retries);
        let handler = self.registry.resolve(node);
        let mut attempt = 0u32;

        let outcome = loop {
            attempt += 1;
            tracing::Span::current().record("attempt", attempt);
            node_retries.entry(node.id.clone()).or_insert(0);

            let invocation = async {
                match &handler {
                    Some(h) => h.run(node, &projected_context, &thread_key, &self.services).await,
                    None => Err(GraphError::handler_fatal(&node.id, format!("no handler registered for '{}'", node.id))),
                }
            };

            let result = match node.timeout_ms {
                Some(ms) => match tokio::time::timeout(Duration::from_millis(ms.max(0.0) as u64), invocation).await {
                    Ok(inner) => inner,
                    Err(_) => Ok(Outcome::retry(format!("node '{}' timed out after {ms}ms", node.id))),
                },
                None => invocation.await,
            };

            let attempt_outcome = match result {
                Ok(o) => o,
                Err(GraphError::HandlerTransient { message, .. }) => Outcome::retry(message),
                Err(GraphError::HandlerFatal { message, .. }) => Outcome::fail(message),
                Err(other) => return Err(other),
            };

            match attempt_outcome.status {
                Some(OutcomeStatus::Retry) => {
                    let message = attempt_outcome.failure_reason.as_deref().unwrap_or("");
                    let transient = retry::is_transient(message);
                    if attempt < policy.max_attempts && transient {
                        *node_retries.get_mut(&node.id).unwrap() += 1;
                        let delay = policy.delay_ms(attempt);
                        self.emitter
                            .emit(PipelineEvent::StageRetrying {
                                timestamp: Utc::now(),
                                name: node.id.clone(),
                                attempt,
                                delay_ms: delay as u64,
                            })
                            .await;
                        tokio::time::sleep(Duration::from_millis(delay as u64)).await;
                        continue;
                    }
                    break Outcome::fail(attempt_outcome.failure_reason.unwrap_or_else(|| "retry budget exhausted".to_string()));
                }
                _ => break attempt_outcome,
            }
        };

        tracing::Span::current().record("outcome", tracing::field::debug(&outcome.status));

        match outcome.status {
            Some(OutcomeStatus::Fail) => {
                self.emitter
                    .emit(PipelineEvent::StageFailed {
                        timestamp: Utc::now(),
                        name: node.id.clone(),
                        reason: outcome.failure_reason.clone().unwrap_or_default(),
                    })
                    .await;
            }
            _ => {
                self.emitter
                    .emit(PipelineEvent::StageCompleted { timestamp: Utc::now(), name: node.id.clone() })
                    .await;
            }
        }

        context.apply_updates(outcome.context_updates.clone());
        Ok(outcome)
    }

    /// §4.N's parallel fan-out/fan-in: spawn one task per active branch edge, run
    /// each independently against a deep-cloned context until it reaches the
    /// region's fan-in node, then merge.
    async fn run_parallel_region(
        &self,
        node: &GraphNode,
        context: &mut Context,
        node_retries: &mut HashMap<String, u32>,
        stage_index: usize,
    ) -> Result<(Outcome, Vec<String>)> {
        self.emitter
            .emit(PipelineEvent::StageStarted {
                timestamp: Utc::now(),
                name: node.id.clone(),
                index: stage_index,
            })
            .await;

        let branch_edges = self.graph.outgoing_edges(&node.id);
        let neutral_outcome = Outcome::success();
        let snapshot = context.snapshot();
        let active_edges: Vec<_> = branch_edges
            .into_iter()
            .filter(|e| {
                e.condition
                    .as_deref()
                    .map(|c| c.trim().is_empty() || condition::evaluate_str(c, &neutral_outcome, &snapshot))
                    .unwrap_or(true)
            })
            .collect();

        self.emitter
            .emit(PipelineEvent::ParallelStarted {
                timestamp: Utc::now(),
                branch_count: active_edges.len(),
            })
            .await;

        let mut handles = Vec::with_capacity(active_edges.len());
        for edge in &active_edges {
            let runner = self.clone();
            let branch_context = context.clone_deep();
            let branch_retries = node_retries.clone();
            let branch_start = edge.to_node.clone();
            let branch_start_edge: GraphEdge = (**edge).clone();
            self.emitter
                .emit(PipelineEvent::ParallelBranchStarted {
                    timestamp: Utc::now(),
                    branch: branch_start.clone(),
                })
                .await;
            handles.push((
                edge.to_node.clone(),
                tokio::spawn(async move { runner.run_branch(branch_start, Some(branch_start_edge), branch_context, branch_retries).await }),
            ));
        }

        let mut branch_results = Vec::with_capacity(handles.len());
        for (branch_id, handle) in handles {
            let outcome = handle
                .await
                .map_err(|e| GraphError::build(format!("parallel branch '{branch_id}' task panicked: {e}")))?;
            branch_results.push((branch_id, outcome));
        }

        let mut success_count = 0usize;
        let mut failure_count = 0usize;
        let mut merged_updates: Vec<(String, serde_json::Value)> = Vec::new();
        let mut fanin_id: Option<String> = None;
        let mut branch_completed_nodes: Vec<String> = Vec::new();

        for (branch_id, result) in &branch_results {
            match result {
                Ok((branch_context, success, reached_fanin, completed)) => {
                    merged_updates.extend(branch_context.snapshot_ordered());
                    branch_completed_nodes.extend(completed.iter().cloned());
                    fanin_id.get_or_insert_with(|| reached_fanin.clone());
                    if *success {
                        success_count += 1;
                    } else {
                        failure_count += 1;
                    }
                    self.emitter
                        .emit(PipelineEvent::ParallelBranchCompleted {
                            timestamp: Utc::now(),
                            branch: branch_id.clone(),
                            success: *success,
                        })
                        .await;
                }
                Err(_) => {
                    failure_count += 1;
                    self.emitter
                        .emit(PipelineEvent::ParallelBranchCompleted {
                            timestamp: Utc::now(),
                            branch: branch_id.clone(),
                            success: false,
                        })
                        .await;
                }
            }
        }

        self.emitter
            .emit(PipelineEvent::ParallelCompleted {
                timestamp: Utc::now(),
                success_count,
                failure_count,
            })
            .await;

        let allow_partial = fanin_id
            .as_deref()
            .and_then(|id| self.graph.node(id))
            .map(|n| n.allow_partial)
            .unwrap_or(false);
        let all_succeeded = failure_count == 0;
        let region_succeeded = all_succeeded || allow_partial;

        let mut merged_context = Context::from_ordered_snapshot(Vec::new());
        merged_context.apply_updates(merged_updates);
        context.apply_updates(merged_context.snapshot_ordered());

        let outcome = if region_succeeded {
            Outcome::success()
        } else {
            Outcome::fail("parallel fan-in failed: one or more branches failed")
        };

        match outcome.status {
            Some(OutcomeStatus::Fail) => {
                self.emitter
                    .emit(PipelineEvent::StageFailed {
                        timestamp: Utc::now(),
                        name: node.id.clone(),
                        reason: outcome.failure_reason.clone().unwrap_or_default(),
                    })
                    .await;
            }
            _ => {
                self.emitter
                    .emit(PipelineEvent::StageCompleted { timestamp: Utc::now(), name: node.id.clone() })
                    .await;
            }
        }

        Ok((outcome, branch_completed_nodes))
    }

    /// Run one parallel branch: standard node-at-a-time execution, stopping the
    /// instant the next node to run resolves to `parallel.fan_in` rather than
    /// executing it (the fan-in node itself carries no handler work). Returns the
    /// branch's own completed-node ids alongside its final context and outcome, so
    /// the caller can fold them into the overall traversal's completed-node list.
    async fn run_branch(
        self,
        start_id: String,
        mut incoming_edge: Option<GraphEdge>,
        mut context: Context,
        mut node_retries: HashMap<String, u32>,
    ) -> Result<(Context, bool, String, Vec<String>)> {
        let mut current_id = start_id;
        let mut previous_node_id: Option<String> = None;
        let mut stage_index = 0usize;
        let mut completed = Vec::new();
        loop {
            let node = self
                .graph
                .node(&current_id)
                .cloned()
                .ok_or_else(|| GraphError::build(format!("parallel branch reached unknown node '{current_id}'")))?;
            let handler_type = self.registry.resolve_type(&node).into_owned();
            if handler_type == "parallel.fan_in" {
                return Ok((context, true, node.id, completed));
            }

            let outcome = self
                .run_node_with_retry(
                    &node,
                    incoming_edge.as_ref(),
                    previous_node_id.as_deref(),
                    &mut context,
                    &mut node_retries,
                    stage_index,
                )
                .await?;
            stage_index += 1;
            completed.push(node.id.clone());

            if outcome.status == Some(OutcomeStatus::Fail) {
                return Ok((context, false, current_id, completed));
            }

            let outgoing = self.graph.outgoing_edges(&node.id);
            match selection::select_edge(&outgoing, &outcome, &context.snapshot()) {
                Some(edge) => {
                    previous_node_id = Some(node.id.clone());
                    current_id = edge.to_node.clone();
                    incoming_edge = Some(edge.clone());
                }
                None => return Err(GraphError::FaninUnreached { node: node.id }),
            }
        }
    }

    async fn save_checkpoint(&self, current_node: &str, context: &Context, node_retries: &HashMap<String, u32>, completed_nodes: &[String]) {
        let state = CheckpointState {
            timestamp: Utc::now(),
            current_node: current_node.to_string(),
            completed_nodes: completed_nodes.to_vec(),
            node_retries: node_retries.clone(),
            context: context.snapshot(),
            logs: context.logs().to_vec(),
        };
        match self.checkpoint_store.save(&state).await {
            Ok(()) => {
                self.emitter
                    .emit(PipelineEvent::CheckpointSaved {
                        timestamp: Utc::now(),
                        node: current_node.to_string(),
                    })
                    .await;
            }
            Err(error) => {
                tracing::warn!(%error, node = current_node, "checkpoint save failed; continuing best-effort");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::lexer::tokenize;
    use crate::parser::parse;
    use crate::registry::{CodergenBackend, Handler, NodeMeta};
    use async_trait::async_trait;
    use flowlang_checkpoint::InMemoryCheckpointStore;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn build_graph(src: &str) -> Graph {
        build(&parse(&tokenize(src).unwrap()).unwrap()).unwrap()
    }

    struct ScriptedBackend {
        outcomes: Mutex<Vec<Outcome>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(outcomes: Vec<Outcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CodergenBackend for ScriptedBackend {
        async fn run(&self, _prompt: &str, _context: &[(String, Value)], _meta: &NodeMeta) -> Result<Outcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                Ok(Outcome::success())
            } else {
                Ok(outcomes.remove(0))
            }
        }
    }

    fn services_with(backend: Arc<ScriptedBackend>) -> Services {
        Services {
            codergen: Some(backend),
            interviewer: None,
            execution_environment: None,
        }
    }

    #[tokio::test]
    async fn linear_success_completes_with_every_node_in_order() {
        let graph = build_graph("digraph G { start [shape=Mdiamond]; A [shape=box]; end [shape=Msquare]; start -> A -> end }");
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let runner = Runner::new(
            graph,
            HandlerRegistry::new(),
            services_with(backend.clone()),
            EngineConfig::new(),
            Arc::new(InMemoryCheckpointStore::new()),
        );

        let result = runner.run().await.unwrap();
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.completed_nodes, vec!["start", "A", "end"]);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn conditional_branch_follows_outcome_status() {
        let graph = build_graph(
            "digraph G { start [shape=Mdiamond]; A [shape=box]; B [shape=box]; C [shape=box]; end [shape=Msquare]; \
             start -> A; A -> B [condition=\"outcome=success\"]; A -> C [condition=\"outcome=fail\"]; B -> end; C -> end }",
        );
        let backend = Arc::new(ScriptedBackend::new(vec![Outcome::success()]));
        let runner = Runner::new(
            graph,
            HandlerRegistry::new(),
            services_with(backend),
            EngineConfig::new(),
            Arc::new(InMemoryCheckpointStore::new()),
        );

        let result = runner.run().await.unwrap();
        assert_eq!(result.status, RunStatus::Completed);
        assert!(result.completed_nodes.contains(&"B".to_string()));
        assert!(!result.completed_nodes.contains(&"C".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_exhaustion_fails_after_max_retries_plus_one_invocations() {
        let graph = build_graph(
            "digraph G { start [shape=Mdiamond]; A [shape=box, max_retries=2]; end [shape=Msquare]; start -> A -> end }",
        );
        let backend = Arc::new(ScriptedBackend::new(vec![
            Outcome::retry("503 unavailable"),
            Outcome::retry("503 unavailable"),
            Outcome::retry("503 unavailable"),
            Outcome::retry("503 unavailable"),
        ]));
        let runner = Runner::new(
            graph,
            HandlerRegistry::new(),
            services_with(backend.clone()),
            EngineConfig::new(),
            Arc::new(InMemoryCheckpointStore::new()),
        );

        let result = runner.run().await.unwrap();
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn parallel_fan_out_merges_both_branches_on_success() {
        let graph = build_graph(
            "digraph G { start [shape=Mdiamond]; P [shape=component]; b1 [shape=box]; b2 [shape=box]; \
             fanin [shape=tripleoctagon]; end [shape=Msquare]; \
             start -> P; P -> b1; P -> b2; b1 -> fanin; b2 -> fanin; fanin -> end }",
        );
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let runner = Runner::new(
            graph,
            HandlerRegistry::new(),
            services_with(backend),
            EngineConfig::new(),
            Arc::new(InMemoryCheckpointStore::new()),
        );

        let result = runner.run().await.unwrap();
        assert_eq!(result.status, RunStatus::Completed);
        assert!(result.completed_nodes.contains(&"b1".to_string()));
        assert!(result.completed_nodes.contains(&"b2".to_string()));
        assert_eq!(result.last_node, Some("end".to_string()));
    }

    #[tokio::test]
    async fn resuming_from_a_checkpoint_skips_completed_nodes() {
        let graph = build_graph(
            "digraph G { start [shape=Mdiamond]; A [shape=box]; B [shape=box]; end [shape=Msquare]; start -> A -> B -> end }",
        );
        let store = Arc::new(InMemoryCheckpointStore::new());
        store
            .save(&CheckpointState {
                timestamp: Utc::now(),
                current_node: "B".to_string(),
                completed_nodes: vec!["start".to_string(), "A".to_string()],
                node_retries: HashMap::new(),
                context: HashMap::new(),
                logs: Vec::new(),
            })
            .await
            .unwrap();

        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let runner = Runner::new(
            graph,
            HandlerRegistry::new(),
            services_with(backend.clone()),
            EngineConfig::new(),
            store,
        );

        let result = runner.run().await.unwrap();
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.completed_nodes, vec!["B", "end"]);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_checkpoint_pointing_at_an_unknown_node_is_rejected() {
        let graph = build_graph("digraph G { start [shape=Mdiamond]; end [shape=Msquare]; start -> end }");
        let store = Arc::new(InMemoryCheckpointStore::new());
        store
            .save(&CheckpointState {
                timestamp: Utc::now(),
                current_node: "nonexistent".to_string(),
                completed_nodes: Vec::new(),
                node_retries: HashMap::new(),
                context: HashMap::new(),
                logs: Vec::new(),
            })
            .await
            .unwrap();

        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let runner = Runner::new(graph, HandlerRegistry::new(), services_with(backend), EngineConfig::new(), store);

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, GraphError::Checkpoint(flowlang_checkpoint::CheckpointError::Stale(_))));
    }
}
