//! Fluent builder returned by pipeline registration.

use super::Pipeline;
use crate::errors::PipeError;
use crate::pipes::{FnPipe, Pipe, SubPipeline};
use serde_json::Value;
use std::sync::Arc;

/// Appends pipes to a pipeline during registration.
///
/// The pipeline is already visible in its group when the builder is handed
/// out, so the builder should be used to completion right away and not kept.
#[derive(Debug)]
pub struct PipelineBuilder {
    pipeline: Arc<Pipeline>,
}

impl PipelineBuilder {
    pub(crate) fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    /// Appends a pipe.
    pub fn add_pipe<P: Pipe + 'static>(self, pipe: P) -> Self {
        self.add_shared_pipe(Arc::new(pipe))
    }

    /// Appends a pipe that may be shared with other pipelines.
    pub fn add_shared_pipe(self, pipe: Arc<dyn Pipe>) -> Self {
        self.pipeline.push(pipe);
        self
    }

    /// Appends a pipe backed by a synchronous function.
    pub fn add_fn<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> Result<Value, PipeError> + Send + Sync + 'static,
    {
        self.add_pipe(FnPipe::new(name, func))
    }

    /// Appends a stage that runs the sibling pipeline registered under `id`.
    pub fn add_pipeline(self, id: impl AsRef<str>) -> Self {
        self.add_pipe(SubPipeline::new(id))
    }

    /// Returns the id of the pipeline under construction.
    #[must_use]
    pub fn id(&self) -> &str {
        self.pipeline.id()
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.pipeline.stage_count()
    }
}
