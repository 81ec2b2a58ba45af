//! Error types for the engine
//!
//! Errors never interrupt the interactive loop. Hot paths degrade to a no-op
//! and structural or configuration problems go through [`ErrorReporter`],
//! which forwards them once to a caller-supplied sink.

use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Taxonomy class of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Dangling references in the node/edge data.
    Structural,
    /// Contradictory bounds, resolved by clamping.
    ConstraintViolation,
    /// A gesture referenced a node that went away.
    StaleReference,
    /// Malformed configuration, replaced by a safe default.
    Configuration,
}

/// Errors that can occur while resolving or interacting with a flow
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Parent node {parent_id} not found for node {node_id}")]
    MissingParent { node_id: String, parent_id: String },

    #[error("Parent chain of node {node_id} contains a cycle")]
    ParentCycle { node_id: String },

    #[error("Parent node {parent_id} of node {node_id} is not resolved yet; parents must come before their children")]
    ParentNotResolved { node_id: String, parent_id: String },

    #[error("Node {node_id} has extent \"parent\" but no parent")]
    ParentExtentWithoutParent { node_id: String },

    #[error("Edge {edge_id} is missing a source or target")]
    IncompleteEdge { edge_id: String },

    #[error("Handle {handle_id:?} not found on node {node_id}")]
    MissingHandle {
        node_id: String,
        handle_id: Option<String>,
    },

    #[error("Contradictory bounds for {what}: min {min} > max {max}")]
    ContradictoryBounds { what: String, min: f64, max: f64 },

    #[error("Node {node_id} disappeared during a gesture")]
    StaleNode { node_id: String },

    #[error("Node {node_id} not found")]
    UnknownNode { node_id: String },

    #[error("Edge {edge_id} not found")]
    UnknownEdge { edge_id: String },

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Invalid padding value {value:?}")]
    InvalidPadding { value: String },

    #[error("Node {node_id} has no dimensions yet")]
    NodeNotMeasured { node_id: String },
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::MissingParent { .. }
            | EngineError::ParentCycle { .. }
            | EngineError::ParentNotResolved { .. }
            | EngineError::ParentExtentWithoutParent { .. }
            | EngineError::IncompleteEdge { .. }
            | EngineError::MissingHandle { .. }
            | EngineError::UnknownNode { .. }
            | EngineError::UnknownEdge { .. } => ErrorKind::Structural,
            EngineError::ContradictoryBounds { .. } => ErrorKind::ConstraintViolation,
            EngineError::StaleNode { .. } => ErrorKind::StaleReference,
            EngineError::InvalidConfig { .. }
            | EngineError::InvalidPadding { .. }
            | EngineError::NodeNotMeasured { .. } => ErrorKind::Configuration,
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Caller-supplied error channel.
pub type ErrorSink = Box<dyn FnMut(&EngineError)>;

/// Forwards engine errors to an optional sink, at most once per message.
#[derive(Default)]
pub struct ErrorReporter {
    sink: Option<ErrorSink>,
    seen: HashSet<String>,
}

impl std::fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("has_sink", &self.sink.is_some())
            .field("reported", &self.seen.len())
            .finish()
    }
}

impl ErrorReporter {
    /// Reporter that only logs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reporter that also forwards each first-seen error to `sink`.
    pub fn with_sink(sink: impl FnMut(&EngineError) + 'static) -> Self {
        Self {
            sink: Some(Box::new(sink)),
            seen: HashSet::new(),
        }
    }

    /// Swap the sink; `None` goes back to logging only.
    pub fn set_sink(&mut self, sink: Option<ErrorSink>) {
        self.sink = sink;
    }

    /// Report an error. Stale references are only logged; everything else is
    /// logged and forwarded the first time its message is seen.
    pub fn report(&mut self, error: EngineError) {
        if error.kind() == ErrorKind::StaleReference {
            debug!(%error, "Gesture aborted");
            return;
        }

        let message = error.to_string();
        if !self.seen.insert(message) {
            return;
        }

        warn!(kind = ?error.kind(), %error, "Engine error");
        if let Some(sink) = self.sink.as_mut() {
            sink(&error);
        }
    }

    /// Forget what has been reported so far, e.g. after the host replaces its data.
    pub fn reset(&mut self) {
        self.seen.clear();
    }
}
