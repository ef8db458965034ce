//! Error types for the pipelining library.
//!
//! Registry errors ([`PipelineError::IdAlreadyExists`], [`PipelineError::IdNotFound`])
//! are configuration mistakes and are returned to the caller as-is. Pipe failures
//! are captured as [`PipeError`] values and recorded on the stage that raised them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for pipelining operations.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// A registration or import reused an identifier already present in the group.
    #[error("Pipeline id '{id}' already exists")]
    IdAlreadyExists {
        /// The colliding identifier.
        id: String,
    },

    /// A lookup requested an identifier with no registered pipeline.
    #[error("Pipeline id '{id}' not found")]
    IdNotFound {
        /// The missing identifier.
        id: String,
    },

    /// A pipe failed while a pipeline was being streamed.
    #[error("{0}")]
    StageFailure(#[from] StageFailure),

    /// A composite stage would nest deeper than the group allows.
    #[error("Pipeline '{id}' exceeds the maximum nesting depth of {max_depth}")]
    RecursionLimit {
        /// The pipeline that could not be entered.
        id: String,
        /// The configured limit.
        max_depth: u32,
    },

    /// The run was cancelled between two stages.
    #[error("Pipeline '{id}' cancelled after {completed_stages} stage(s): {reason}")]
    Cancelled {
        /// The pipeline identifier.
        id: String,
        /// Number of stages that finished before cancellation was observed.
        completed_stages: usize,
        /// The cancellation reason.
        reason: String,
    },
}

impl PipelineError {
    /// Creates an id-already-exists error.
    #[must_use]
    pub fn id_already_exists(id: impl Into<String>) -> Self {
        Self::IdAlreadyExists { id: id.into() }
    }

    /// Creates an id-not-found error.
    #[must_use]
    pub fn id_not_found(id: impl Into<String>) -> Self {
        Self::IdNotFound { id: id.into() }
    }

    /// Returns a stable tag for the error variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::IdAlreadyExists { .. } => "IdAlreadyExists",
            Self::IdNotFound { .. } => "IdNotFound",
            Self::StageFailure(_) => "StageFailure",
            Self::RecursionLimit { .. } => "RecursionLimit",
            Self::Cancelled { .. } => "Cancelled",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));

        match self {
            Self::IdAlreadyExists { id } | Self::IdNotFound { id } => {
                map.insert("id".to_string(), serde_json::json!(id));
            }
            Self::StageFailure(failure) => {
                map.insert("pipe".to_string(), serde_json::json!(failure.pipe));
                map.insert("index".to_string(), serde_json::json!(failure.index));
                map.insert("error_kind".to_string(), serde_json::json!(failure.error.kind));
            }
            Self::RecursionLimit { id, max_depth } => {
                map.insert("id".to_string(), serde_json::json!(id));
                map.insert("max_depth".to_string(), serde_json::json!(max_depth));
            }
            Self::Cancelled {
                id,
                completed_stages,
                reason,
            } => {
                map.insert("id".to_string(), serde_json::json!(id));
                map.insert("completed_stages".to_string(), serde_json::json!(completed_stages));
                map.insert("reason".to_string(), serde_json::json!(reason));
            }
        }

        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// An error raised by a pipe's transformation.
///
/// The message is kept verbatim so callers can match on what the pipe reported.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct PipeError {
    /// Error kind tag (e.g. "InvalidOperation").
    pub kind: String,
    /// The error message.
    pub message: String,
}

impl PipeError {
    /// Creates a new pipe error.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid-operation error.
    #[must_use]
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new("InvalidOperation", message)
    }

    /// Creates an error for an input value of the wrong shape.
    #[must_use]
    pub fn invalid_input(expected: &str, actual: &serde_json::Value) -> Self {
        Self::new(
            "InvalidInput",
            format!("expected {expected}, got {}", value_type_name(actual)),
        )
    }

    /// Creates an error for a pipe that panicked.
    #[must_use]
    pub fn panicked(message: impl Into<String>) -> Self {
        Self::new("Panic", message)
    }

    /// Creates an error for a pipe that stopped because its run was cancelled.
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new("Cancelled", message)
    }

    /// Returns true if this error reports a cancellation rather than a failure.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        self.kind == "Cancelled"
    }
}

impl From<anyhow::Error> for PipeError {
    fn from(err: anyhow::Error) -> Self {
        Self::new("Error", err.to_string())
    }
}

impl From<serde_json::Error> for PipeError {
    fn from(err: serde_json::Error) -> Self {
        Self::new("Serialization", err.to_string())
    }
}

impl From<PipelineError> for PipeError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::StageFailure(failure) => failure.error,
            other => Self::new(other.kind(), other.to_string()),
        }
    }
}

/// A pipe failure tied to the stage that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Pipe '{pipe}' failed at stage {index}: {error}")]
pub struct StageFailure {
    /// Identity tag of the failing pipe.
    pub pipe: String,
    /// Zero-based position of the stage.
    pub index: usize,
    /// The captured error.
    pub error: PipeError,
}

impl StageFailure {
    /// Creates a new stage failure.
    #[must_use]
    pub fn new(pipe: impl Into<String>, index: usize, error: PipeError) -> Self {
        Self {
            pipe: pipe.into(),
            index,
            error,
        }
    }
}

fn value_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
