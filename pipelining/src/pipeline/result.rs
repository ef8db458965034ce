//! Run and per-stage result types.

use crate::errors::PipeError;
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Terminal state of an eager run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every stage succeeded.
    Completed,
    /// A stage failed and the remaining stages were skipped.
    Failed,
    /// Cancellation was observed between two stages.
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Record of one pipe's execution within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    /// Identity tag of the pipe.
    pub pipe: String,
    /// Zero-based stage position.
    pub index: usize,
    /// When the pipe was invoked.
    pub started_at: Timestamp,
    /// When the pipe returned. Never earlier than `started_at`.
    pub ended_at: Timestamp,
    /// The captured error, if the pipe failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PipeError>,
}

impl StageResult {
    /// Creates a stage result, clamping `ended_at` to `started_at` if the wall clock stepped back.
    #[must_use]
    pub fn new(
        pipe: impl Into<String>,
        index: usize,
        started_at: Timestamp,
        ended_at: Timestamp,
        error: Option<PipeError>,
    ) -> Self {
        Self {
            pipe: pipe.into(),
            index,
            started_at,
            ended_at: ended_at.max(started_at),
            error,
        }
    }

    /// Returns how long the pipe ran.
    #[must_use]
    pub fn duration(&self) -> Duration {
        (self.ended_at - self.started_at).to_std().unwrap_or_default()
    }

    /// Returns true if the pipe succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate outcome of an eager run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// The pipeline id.
    pub id: String,
    /// Unique id of this run.
    pub run_id: Uuid,
    /// Final output.
    ///
    /// `None` for a pipeline without stages. After a failure this describes
    /// the failing stage (`pipe`, `index`, `kind`, `message`); after
    /// cancellation it is the last value produced.
    pub output: Option<Value>,
    /// True iff the run completed with no failed stage.
    ///
    /// A cancelled run is also unsuccessful even when none of its stages
    /// carries an error, so use `status` to tell cancellation from failure.
    /// If the token fired inside a nested pipeline, the interrupted composite
    /// stage carries an error of kind `Cancelled`.
    pub success: bool,
    /// Terminal state.
    pub status: RunStatus,
    /// Wall-clock time across the executed stages.
    pub elapsed: Duration,
    /// One entry per executed stage, in order.
    pub stages: Vec<StageResult>,
}

impl PipelineResult {
    pub(crate) fn empty(id: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            id: id.into(),
            run_id,
            output: None,
            success: true,
            status: RunStatus::Completed,
            elapsed: Duration::ZERO,
            stages: Vec::new(),
        }
    }

    pub(crate) fn completed(
        id: impl Into<String>,
        run_id: Uuid,
        output: Value,
        elapsed: Duration,
        stages: Vec<StageResult>,
    ) -> Self {
        Self {
            id: id.into(),
            run_id,
            output: Some(output),
            success: true,
            status: RunStatus::Completed,
            elapsed,
            stages,
        }
    }

    pub(crate) fn failed(
        id: impl Into<String>,
        run_id: Uuid,
        elapsed: Duration,
        stages: Vec<StageResult>,
    ) -> Self {
        let output = stages.last().and_then(|stage| {
            stage.error.as_ref().map(|error| {
                serde_json::json!({
                    "pipe": stage.pipe,
                    "index": stage.index,
                    "kind": error.kind,
                    "message": error.message,
                })
            })
        });

        Self {
            id: id.into(),
            run_id,
            output,
            success: false,
            status: RunStatus::Failed,
            elapsed,
            stages,
        }
    }

    pub(crate) fn cancelled(
        id: impl Into<String>,
        run_id: Uuid,
        output: Value,
        elapsed: Duration,
        stages: Vec<StageResult>,
    ) -> Self {
        Self {
            id: id.into(),
            run_id,
            output: Some(output),
            success: false,
            status: RunStatus::Cancelled,
            elapsed,
            stages,
        }
    }

    /// Returns the stage that failed, if any.
    #[must_use]
    pub fn failed_stage(&self) -> Option<&StageResult> {
        self.stages.iter().find(|stage| stage.error.is_some())
    }

    /// Returns the captured error of the failed stage, if any.
    #[must_use]
    pub fn error(&self) -> Option<&PipeError> {
        self.failed_stage().and_then(|stage| stage.error.as_ref())
    }

    /// Returns the number of stages that ran.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}
