//! Composite pipe that runs another registered pipeline.

use super::{Pipe, PipeContext};
use crate::errors::PipeError;
use crate::pipeline::RunStatus;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// A pipe whose transformation is an eager run of a sibling pipeline.
///
/// The nested run's stage results stay inside the nested run; the outer
/// pipeline records a single stage for this pipe.
#[derive(Debug, Clone)]
pub struct SubPipeline {
    id: String,
    name: String,
}

impl SubPipeline {
    /// Creates a composite pipe for the pipeline registered under `id`.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        let id = id.as_ref().to_string();
        let name = format!("pipeline:{id}");
        Self { id, name }
    }

    /// Returns the id of the nested pipeline.
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl Pipe for SubPipeline {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, input: Value, ctx: &PipeContext) -> Result<Value, PipeError> {
        let runner = ctx.runner(&self.id)?;

        debug!(
            parent = %ctx.pipeline_id(),
            child = %self.id,
            depth = runner.depth(),
            "Running nested pipeline"
        );

        let result = runner.run(input).await;

        match result.status {
            RunStatus::Completed => Ok(result.output.unwrap_or(Value::Null)),
            RunStatus::Failed => Err(result.error().cloned().unwrap_or_else(|| {
                PipeError::invalid_operation(format!("Nested pipeline '{}' failed", self.id))
            })),
            RunStatus::Cancelled => Err(PipeError::cancelled(format!(
                "Nested pipeline '{}' was cancelled",
                self.id
            ))),
        }
    }
}
