//! The event stream (§4.M, §6): a subscriber-list emitter fanning typed pipeline
//! events out to bounded-queue async pull-iterators. No callbacks — every subscriber
//! consumes events by polling [`EventReceiver::next`] or via [`EventReceiver::into_stream`]
//! (a `tokio_stream::wrappers::ReceiverStream`, itself a `futures_core::Stream`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// One entry of the typed discriminated union described in §6. `timestamp` is
/// attached at emission time by [`EventEmitter::emit`], not by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    PipelineStarted { timestamp: DateTime<Utc>, start_node: String },
    PipelineCompleted { timestamp: DateTime<Utc>, last_node: String },
    PipelineFailed { timestamp: DateTime<Utc>, reason: String },
    StageStarted { timestamp: DateTime<Utc>, name: String, index: usize },
    StageCompleted { timestamp: DateTime<Utc>, name: String },
    StageFailed { timestamp: DateTime<Utc>, name: String, reason: String },
    StageRetrying { timestamp: DateTime<Utc>, name: String, attempt: u32, delay_ms: u64 },
    ParallelStarted { timestamp: DateTime<Utc>, branch_count: usize },
    ParallelBranchStarted { timestamp: DateTime<Utc>, branch: String },
    ParallelBranchCompleted { timestamp: DateTime<Utc>, branch: String, success: bool },
    ParallelCompleted { timestamp: DateTime<Utc>, success_count: usize, failure_count: usize },
    InterviewStarted { timestamp: DateTime<Utc>, node: String },
    InterviewCompleted { timestamp: DateTime<Utc>, node: String },
    InterviewTimeout { timestamp: DateTime<Utc>, node: String },
    CheckpointSaved { timestamp: DateTime<Utc>, node: String },
    CheckpointResumed { timestamp: DateTime<Utc>, resumed_from_node: String, skipped_nodes: Vec<String> },
    LoopRestarted { timestamp: DateTime<Utc>, from: String, to: String },
}

impl PipelineEvent {
    pub fn type_tag(&self) -> &'static str {
        match self {
            PipelineEvent::PipelineStarted { .. } => "pipeline_started",
            PipelineEvent::PipelineCompleted { .. } => "pipeline_completed",
            PipelineEvent::PipelineFailed { .. } => "pipeline_failed",
            PipelineEvent::StageStarted { .. } => "stage_started",
            PipelineEvent::StageCompleted { .. } => "stage_completed",
            PipelineEvent::StageFailed { .. } => "stage_failed",
            PipelineEvent::StageRetrying { .. } => "stage_retrying",
            PipelineEvent::ParallelStarted { .. } => "parallel_started",
            PipelineEvent::ParallelBranchStarted { .. } => "parallel_branch_started",
            PipelineEvent::ParallelBranchCompleted { .. } => "parallel_branch_completed",
            PipelineEvent::ParallelCompleted { .. } => "parallel_completed",
            PipelineEvent::InterviewStarted { .. } => "interview_started",
            PipelineEvent::InterviewCompleted { .. } => "interview_completed",
            PipelineEvent::InterviewTimeout { .. } => "interview_timeout",
            PipelineEvent::CheckpointSaved { .. } => "checkpoint_saved",
            PipelineEvent::CheckpointResumed { .. } => "checkpoint_resumed",
            PipelineEvent::LoopRestarted { .. } => "loop_restarted",
        }
    }
}

/// Async pull-iterator handed to subscribers. Wraps a bounded `mpsc` receiver; call
/// [`into_stream`](Self::into_stream) to drive it as a `tokio_stream::Stream` instead.
pub struct EventReceiver {
    inner: mpsc::Receiver<PipelineEvent>,
}

impl EventReceiver {
    pub async fn next(&mut self) -> Option<PipelineEvent> {
        self.inner.recv().await
    }

    pub fn into_stream(self) -> ReceiverStream<PipelineEvent> {
        ReceiverStream::new(self.inner)
    }
}

/// Fan-out emitter: `subscribe()` registers a new bounded-queue receiver, `emit()`
/// delivers the event to every live subscriber. Back-pressure blocks the emitting
/// side rather than dropping events, preserving per-traversal ordering (§5).
pub struct EventEmitter {
    capacity: usize,
    subscribers: tokio::sync::Mutex<Vec<mpsc::Sender<PipelineEvent>>>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    pub async fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.lock().await.push(tx);
        EventReceiver { inner: rx }
    }

    /// Deliver `event` to every subscriber, dropping only senders whose receiver has
    /// already been released.
    pub async fn emit(&self, event: PipelineEvent) {
        let mut subscribers = self.subscribers.lock().await;
        let mut live = Vec::with_capacity(subscribers.len());
        for tx in subscribers.drain(..) {
            if tx.send(event.clone()).await.is_ok() {
                live.push(tx);
            }
        }
        *subscribers = live;
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}
