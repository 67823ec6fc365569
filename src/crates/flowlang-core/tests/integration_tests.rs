//! End-to-end traversal scenarios exercising the compiler and runner together:
//! linear success, conditional branching, retry exhaustion, parallel fan-out/fan-in,
//! and resume-from-checkpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flowlang_checkpoint::{CheckpointState, CheckpointStore, InMemoryCheckpointStore};
use flowlang_core::builder::build;
use flowlang_core::config::EngineConfig;
use flowlang_core::events::{EventReceiver, PipelineEvent};
use flowlang_core::graph::Outcome;
use flowlang_core::lexer::tokenize;
use flowlang_core::parser::parse;
use flowlang_core::registry::{CodergenBackend, HandlerRegistry, NodeMeta, Services};
use flowlang_core::runner::{RunStatus, Runner};
use serde_json::Value;

fn compile(source: &str) -> flowlang_core::graph::Graph {
    let tokens = tokenize(source).expect("tokenize");
    let ast = parse(&tokens).expect("parse");
    build(&ast).expect("build")
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

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodergenBackend for ScriptedBackend {
    async fn run(&self, _prompt: &str, _context: &[(String, Value)], _meta: &NodeMeta) -> flowlang_core::Result<Outcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut outcomes = self.outcomes.lock().unwrap();
        Ok(if outcomes.is_empty() { Outcome::success() } else { outcomes.remove(0) })
    }
}

fn services_with(backend: Arc<ScriptedBackend>) -> Services {
    Services {
        codergen: Some(backend),
        interviewer: None,
        execution_environment: None,
    }
}

/// Collects everything already buffered on the channel, waiting briefly for
/// stragglers. Safe to call only after the traversal it's observing has finished,
/// since by then every emit() the runner will ever make has already been sent.
async fn drain(mut rx: EventReceiver) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_millis(50), rx.next()).await {
            Ok(Some(event)) => events.push(event),
            _ => break,
        }
    }
    events
}

fn tags(events: &[PipelineEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.type_tag()).collect()
}

#[tokio::test]
async fn linear_success_emits_the_expected_stage_sequence() {
    let graph = compile("digraph G { start [shape=Mdiamond]; A [shape=box]; end [shape=Msquare]; start -> A -> end }");
    let backend = Arc::new(ScriptedBackend::new(vec![Outcome::success()]));
    let runner = Runner::new(
        graph,
        HandlerRegistry::new(),
        services_with(backend),
        EngineConfig::new(),
        Arc::new(InMemoryCheckpointStore::new()),
    );

    let rx = runner.subscribe().await;
    let result = runner.run().await.unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.completed_nodes, vec!["start", "A", "end"]);

    let events = drain(rx).await;
    let pipeline_shape: Vec<_> = tags(&events).into_iter().filter(|t| !t.starts_with("checkpoint")).collect();
    assert_eq!(
        pipeline_shape,
        vec![
            "pipeline_started",
            "stage_started",
            "stage_completed",
            "stage_started",
            "stage_completed",
            "stage_started",
            "stage_completed",
            "pipeline_completed",
        ]
    );
}

#[tokio::test]
async fn conditional_branch_routes_on_success_vs_fail() {
    let success_graph = compile(
        "digraph G { start [shape=Mdiamond]; A [shape=box]; B [shape=box]; C [shape=box]; end [shape=Msquare]; \
         start -> A; A -> B [condition=\"outcome=success\"]; A -> C [condition=\"outcome=fail\"]; B -> end; C -> end }",
    );
    let backend = Arc::new(ScriptedBackend::new(vec![Outcome::success()]));
    let runner = Runner::new(
        success_graph,
        HandlerRegistry::new(),
        services_with(backend),
        EngineConfig::new(),
        Arc::new(InMemoryCheckpointStore::new()),
    );
    let result = runner.run().await.unwrap();
    assert!(result.completed_nodes.contains(&"B".to_string()));
    assert!(!result.completed_nodes.contains(&"C".to_string()));

    let fail_graph = compile(
        "digraph G { start [shape=Mdiamond]; A [shape=box]; B [shape=box]; C [shape=box]; end [shape=Msquare]; \
         start -> A; A -> B [condition=\"outcome=success\"]; A -> C [condition=\"outcome=fail\"]; B -> end; C -> end }",
    );
    let failing_backend = Arc::new(ScriptedBackend::new(vec![Outcome::fail("boom")]));
    let runner = Runner::new(
        fail_graph,
        HandlerRegistry::new(),
        services_with(failing_backend),
        EngineConfig::new(),
        Arc::new(InMemoryCheckpointStore::new()),
    );
    let result = runner.run().await.unwrap();
    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.completed_nodes.contains(&"A".to_string()));
    assert!(!result.completed_nodes.contains(&"B".to_string()));
}

#[tokio::test(start_paused = true)]
async fn retry_exhaustion_stops_after_max_retries_plus_one_invocations() {
    let graph = compile("digraph G { start [shape=Mdiamond]; A [shape=box, max_retries=2]; end [shape=Msquare]; start -> A -> end }");
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

    let rx = runner.subscribe().await;
    let result = runner.run().await.unwrap();
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(backend.call_count(), 3);

    let events = drain(rx).await;
    let shape: Vec<_> = tags(&events).into_iter().filter(|t| !t.starts_with("checkpoint")).collect();
    assert_eq!(
        shape,
        vec![
            "pipeline_started",
            "stage_started",
            "stage_retrying",
            "stage_retrying",
            "stage_failed",
            "pipeline_failed",
        ]
    );
    let retry_attempts: Vec<u32> = events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::StageRetrying { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(retry_attempts, vec![1, 2]);
}

#[tokio::test]
async fn parallel_fan_out_merges_successful_branches_at_fan_in() {
    let graph = compile(
        "digraph G { start [shape=Mdiamond]; P [shape=component]; b1 [shape=box]; b2 [shape=box]; \
         fanin [shape=tripleoctagon]; end [shape=Msquare]; \
         start -> P; P -> b1; P -> b2; b1 -> fanin; b2 -> fanin; fanin -> end }",
    );
    let backend = Arc::new(ScriptedBackend::new(vec![]));
    let runner = Runner::new(
        graph,
        HandlerRegistry::new(),
        services_with(backend.clone()),
        EngineConfig::new(),
        Arc::new(InMemoryCheckpointStore::new()),
    );

    let rx = runner.subscribe().await;
    let result = runner.run().await.unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.completed_nodes.contains(&"b1".to_string()));
    assert!(result.completed_nodes.contains(&"b2".to_string()));
    assert_eq!(backend.call_count(), 2);

    let events = drain(rx).await;
    assert!(events.iter().any(|e| matches!(e, PipelineEvent::ParallelStarted { branch_count: 2, .. })));
    assert!(events.iter().any(|e| matches!(e, PipelineEvent::ParallelCompleted { success_count: 2, failure_count: 0, .. })));
    let branch_completions: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, PipelineEvent::ParallelBranchCompleted { .. }))
        .collect();
    assert_eq!(branch_completions.len(), 2);
}

#[tokio::test]
async fn parallel_fan_in_fails_when_a_branch_fails_and_partial_is_not_allowed() {
    let graph = compile(
        "digraph G { start [shape=Mdiamond]; P [shape=component]; b1 [shape=box]; b2 [shape=box]; \
         fanin [shape=tripleoctagon]; end [shape=Msquare]; \
         start -> P; P -> b1; P -> b2; b1 -> fanin; b2 -> fanin; fanin -> end }",
    );
    struct FlakyOnFirstCall(AtomicUsize);
    #[async_trait]
    impl CodergenBackend for FlakyOnFirstCall {
        async fn run(&self, _prompt: &str, _context: &[(String, Value)], _meta: &NodeMeta) -> flowlang_core::Result<Outcome> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(if n == 0 { Outcome::fail("branch blew up") } else { Outcome::success() })
        }
    }
    let backend = Arc::new(FlakyOnFirstCall(AtomicUsize::new(0)));
    let runner = Runner::new(
        graph,
        HandlerRegistry::new(),
        Services {
            codergen: Some(backend),
            interviewer: None,
            execution_environment: None,
        },
        EngineConfig::new(),
        Arc::new(InMemoryCheckpointStore::new()),
    );

    let result = runner.run().await.unwrap();
    assert_eq!(result.status, RunStatus::Failed);
}

#[tokio::test]
async fn resuming_from_a_checkpoint_replays_only_the_remaining_nodes() {
    let graph = compile(
        "digraph G { n1 [shape=Mdiamond]; n2 [shape=box]; n3 [shape=box]; n4 [shape=box]; n5 [shape=Msquare]; \
         n1 -> n2 -> n3 -> n4 -> n5 }",
    );
    let store = Arc::new(InMemoryCheckpointStore::new());
    store
        .save(&CheckpointState {
            timestamp: chrono::Utc::now(),
            current_node: "n4".to_string(),
            completed_nodes: vec!["n1".to_string(), "n2".to_string(), "n3".to_string()],
            node_retries: Default::default(),
            context: Default::default(),
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

    let rx = runner.subscribe().await;
    let result = runner.run().await.unwrap();
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.completed_nodes, vec!["n4", "n5"]);
    assert_eq!(backend.call_count(), 1);

    let events = drain(rx).await;
    let resumed = events.iter().find_map(|e| match e {
        PipelineEvent::CheckpointResumed {
            resumed_from_node,
            skipped_nodes,
            ..
        } => Some((resumed_from_node.clone(), skipped_nodes.clone())),
        _ => None,
    });
    assert_eq!(resumed, Some(("n4".to_string(), vec!["n1".to_string(), "n2".to_string(), "n3".to_string()])));
}
