//! Per-stage execution context handed to pipes.

use crate::cancellation::CancellationToken;
use crate::errors::PipelineError;
use crate::pipeline::{GroupHandle, PipelineGroup, PipelineRunner};
use std::sync::Arc;
use uuid::Uuid;

/// Context for a single stage invocation.
///
/// Carries the identity of the run and the group used to resolve sibling
/// pipelines, so composite pipes can call into other registered pipelines.
#[derive(Debug, Clone)]
pub struct PipeContext {
    pipeline_id: String,
    run_id: Uuid,
    stage_index: usize,
    depth: u32,
    group: PipelineGroup,
    owner: GroupHandle,
    cancellation: Option<Arc<CancellationToken>>,
}

impl PipeContext {
    pub(crate) fn new(
        pipeline_id: impl Into<String>,
        run_id: Uuid,
        stage_index: usize,
        depth: u32,
        group: PipelineGroup,
        owner: GroupHandle,
        cancellation: Option<Arc<CancellationToken>>,
    ) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            run_id,
            stage_index,
            depth,
            group,
            owner,
            cancellation,
        }
    }

    /// Creates a context outside of any run, for calling a pipe directly.
    #[must_use]
    pub fn detached(pipeline_id: impl Into<String>, group: PipelineGroup) -> Self {
        let owner = group.handle();
        Self::new(pipeline_id, Uuid::new_v4(), 0, 0, group, owner, None)
    }

    /// Returns the id of the pipeline being run.
    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    /// Returns the unique id of this run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the zero-based position of the current stage.
    #[must_use]
    pub fn stage_index(&self) -> usize {
        self.stage_index
    }

    /// Returns the composite nesting depth (0 for a top-level run).
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns the group the run was started from.
    #[must_use]
    pub fn group(&self) -> &PipelineGroup {
        &self.group
    }

    /// Returns whether cancellation has been requested for this run.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    /// Resolves a sibling pipeline into a runner one nesting level deeper.
    ///
    /// The group the run was started from is searched first, then the group
    /// that owns the current pipeline. The cancellation token, if any, is
    /// forwarded to the nested runner.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::RecursionLimit`] when the current depth has
    /// reached the group's `max_depth`, and [`PipelineError::IdNotFound`] when
    /// neither group has `id`.
    pub fn runner(&self, id: impl AsRef<str>) -> Result<PipelineRunner, PipelineError> {
        let id = id.as_ref();

        let max_depth = self.group.config().max_depth;
        if self.depth >= max_depth {
            return Err(PipelineError::RecursionLimit {
                id: id.to_string(),
                max_depth,
            });
        }

        let pipeline = match self.group.pipeline(id) {
            Some(pipeline) => pipeline,
            None => self
                .owner
                .upgrade()
                .and_then(|owner| owner.pipeline(id))
                .ok_or_else(|| PipelineError::id_not_found(id))?,
        };

        let runner = PipelineRunner::new(pipeline, self.group.clone()).nested(self.depth + 1);
        Ok(match &self.cancellation {
            Some(token) => runner.with_cancellation(Arc::clone(token)),
            None => runner,
        })
    }
}
