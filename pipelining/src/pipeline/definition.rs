//! The pipeline definition: an id and an ordered list of pipes.

use super::GroupHandle;
use crate::pipes::Pipe;
use parking_lot::RwLock;
use std::sync::Arc;

/// A named, ordered sequence of pipes.
///
/// Pipes are appended only through the [`PipelineBuilder`](super::PipelineBuilder)
/// returned at registration. Each run takes a snapshot of the pipe list when it
/// starts, so a run always sees a fixed sequence.
pub struct Pipeline {
    id: String,
    pipes: RwLock<Vec<Arc<dyn Pipe>>>,
    group: GroupHandle,
}

impl Pipeline {
    pub(crate) fn new(id: impl Into<String>, group: GroupHandle) -> Self {
        Self {
            id: id.into(),
            pipes: RwLock::new(Vec::new()),
            group,
        }
    }

    /// Returns the pipeline id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.pipes.read().len()
    }

    /// Returns a snapshot of the pipes in stage order.
    #[must_use]
    pub fn pipes(&self) -> Vec<Arc<dyn Pipe>> {
        self.pipes.read().clone()
    }

    /// Returns the identity tags of the pipes in stage order.
    #[must_use]
    pub fn pipe_names(&self) -> Vec<String> {
        self.pipes
            .read()
            .iter()
            .map(|pipe| pipe.name().to_string())
            .collect()
    }

    /// Returns the non-owning handle to the group this pipeline was registered in.
    #[must_use]
    pub fn group(&self) -> &GroupHandle {
        &self.group
    }

    pub(crate) fn push(&self, pipe: Arc<dyn Pipe>) {
        self.pipes.write().push(pipe);
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("pipes", &self.pipe_names())
            .finish()
    }
}
