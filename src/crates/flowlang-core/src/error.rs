//! Error types for pipeline compilation and execution.
//!
//! All error codes named in the compiler and runner taxonomy are variants of a single
//! flat enum, following the same shape as [`flowlang_checkpoint::CheckpointError`]:
//! one variant per failure leaf, `#[error("...")]` messages, and `#[from]` conversions
//! for the handful of upstream error types we wrap rather than re-describe.
//!
//! Validator [`Diagnostic`](crate::validator::Diagnostic) values are deliberately *not*
//! variants here — they are a separate, non-fatal-by-default value type. A diagnostic
//! only becomes a [`GraphError`] when [`crate::validator::validate_or_raise`] rejects it.

use thiserror::Error;

/// Convenience result type using [`GraphError`].
pub type Result<T> = std::result::Result<T, GraphError>;

/// Every failure mode the compiler and runner can produce.
#[derive(Error, Debug)]
pub enum GraphError {
    /// `LEXER_UNTERMINATED_STRING`
    #[error("unterminated string literal starting at line {line}, column {column}")]
    LexUnterminatedString { line: usize, column: usize },

    /// `LEXER_UNEXPECTED_CHAR`
    #[error("unexpected character '{ch}' at line {line}, column {column}")]
    LexUnexpectedChar { ch: char, line: usize, column: usize },

    /// `PARSE_EXPECTED_X_GOT_Y`
    #[error("expected {expected}, found {found} at line {line}, column {column}")]
    ParseExpected {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },

    /// `PARSE_EXPECTED_DIGRAPH` — the source does not open with `digraph <id> {`.
    #[error("expected 'digraph' at the start of the source")]
    ParseExpectedDigraph,

    /// `BUILD_*` — the AST could not be lowered into a semantic graph.
    #[error("graph build failed: {0}")]
    Build(String),

    /// `VALIDATE_*` surfaced by `validate_or_raise` — the first diagnostic of
    /// severity `error` in the validator's report.
    #[error("graph validation failed: {0}")]
    Validation(String),

    /// `BAD_CONDITION` — an edge's condition string does not parse.
    #[error("condition '{raw}' does not parse: {reason}")]
    BadCondition { raw: String, reason: String },

    /// `HANDLER_TRANSIENT` — exhausted without the retry predicate accepting a retry.
    #[error("handler for node '{node}' failed transiently: {message}")]
    HandlerTransient { node: String, message: String },

    /// `HANDLER_FATAL` — a handler failure the retry loop will not absorb.
    #[error("handler for node '{node}' failed: {message}")]
    HandlerFatal { node: String, message: String },

    /// `NO_NEXT_EDGE` — edge selection produced nothing for a non-terminal node.
    #[error("node '{node}' has no outgoing edge for the current outcome")]
    NoNextEdge { node: String },

    /// `CYCLE_WITHOUT_PROGRESS` — a loop-restart edge kept returning to the same
    /// node without any retry budget remaining.
    #[error("traversal revisited node '{node}' without making progress")]
    CycleWithoutProgress { node: String },

    /// `FANIN_UNREACHED` — a parallel region ended without every branch reaching
    /// its fan-in node.
    #[error("parallel fan-in node '{node}' was not reached by all branches")]
    FaninUnreached { node: String },

    /// `ARTIFACT_IO` — the artifact store failed to read or write a file-backed blob.
    #[error("artifact I/O error for '{artifact_id}': {source}")]
    ArtifactIo {
        artifact_id: String,
        #[source]
        source: std::io::Error,
    },

    /// Wraps [`flowlang_checkpoint::CheckpointError`]; covers both `CHECKPOINT_WRITE`
    /// (non-fatal, reported on the event stream) and `CHECKPOINT_STALE` (fatal, raised
    /// directly to the caller of resume).
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] flowlang_checkpoint::CheckpointError),

    /// JSON (de)serialization failure outside the checkpoint and artifact paths.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all filesystem failure outside the artifact store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    pub fn build(msg: impl Into<String>) -> Self {
        Self::Build(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn bad_condition(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadCondition {
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    pub fn handler_fatal(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerFatal {
            node: node.into(),
            message: message.into(),
        }
    }

    pub fn handler_transient(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerTransient {
            node: node.into(),
            message: message.into(),
        }
    }
}
