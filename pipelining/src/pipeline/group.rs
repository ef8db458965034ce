//! Pipeline group: a concurrent registry of pipelines by id.

use super::{Pipeline, PipelineBuilder, PipelineResult, PipelineRunner, PipelineStream};
use crate::config::GroupConfig;
use crate::errors::PipelineError;
use crate::events::{EventSink, NoOpEventSink};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

struct GroupInner {
    pipelines: DashMap<String, Arc<Pipeline>>,
    config: GroupConfig,
    event_sink: RwLock<Arc<dyn EventSink>>,
}

/// A group of pipelines that can reference each other.
///
/// Cloning a group is cheap and yields another handle to the same registry.
/// Registration and lookup are safe to call from many threads at once.
#[derive(Clone)]
pub struct PipelineGroup {
    inner: Arc<GroupInner>,
}

/// A non-owning handle to a [`PipelineGroup`].
///
/// Pipelines hold one of these to reach their owning group without keeping it alive.
#[derive(Clone, Default)]
pub struct GroupHandle {
    inner: Weak<GroupInner>,
}

impl GroupHandle {
    /// Returns the group if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<PipelineGroup> {
        self.inner.upgrade().map(|inner| PipelineGroup { inner })
    }
}

impl std::fmt::Debug for GroupHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupHandle")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// A reusable set of pipeline registrations.
///
/// Implement this to package pipelines that other groups can import.
pub trait PipelineModule {
    /// Registers the module's pipelines into `group`.
    fn configure(group: &PipelineGroup) -> Result<(), PipelineError>;
}

impl PipelineGroup {
    /// Creates an empty group with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(GroupConfig::default())
    }

    /// Creates an empty group with the given configuration.
    #[must_use]
    pub fn with_config(config: GroupConfig) -> Self {
        Self {
            inner: Arc::new(GroupInner {
                pipelines: DashMap::new(),
                config,
                event_sink: RwLock::new(Arc::new(NoOpEventSink)),
            }),
        }
    }

    /// Creates a group populated by a [`PipelineModule`].
    pub fn from_module<M: PipelineModule>() -> Result<Self, PipelineError> {
        let group = Self::new();
        M::configure(&group)?;
        Ok(group)
    }

    /// Returns the group configuration.
    #[must_use]
    pub fn config(&self) -> &GroupConfig {
        &self.inner.config
    }

    /// Returns the sink that runs started from this group emit to.
    #[must_use]
    pub fn event_sink(&self) -> Arc<dyn EventSink> {
        self.inner.event_sink.read().clone()
    }

    /// Sets the event sink and returns the group.
    #[must_use]
    pub fn with_event_sink(self, sink: Arc<dyn EventSink>) -> Self {
        self.set_event_sink(sink);
        self
    }

    /// Replaces the event sink.
    pub fn set_event_sink(&self, sink: Arc<dyn EventSink>) {
        *self.inner.event_sink.write() = sink;
    }

    /// Returns a non-owning handle to this group.
    #[must_use]
    pub fn handle(&self) -> GroupHandle {
        GroupHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Registers a new, empty pipeline and returns its builder.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IdAlreadyExists`] if `id` is taken. The group
    /// is left unchanged in that case.
    pub fn register(&self, id: impl AsRef<str>) -> Result<PipelineBuilder, PipelineError> {
        let id = id.as_ref();

        match self.inner.pipelines.entry(id.to_string()) {
            Entry::Occupied(_) => Err(PipelineError::id_already_exists(id)),
            Entry::Vacant(slot) => {
                let pipeline = Arc::new(Pipeline::new(id, self.handle()));
                slot.insert(Arc::clone(&pipeline));
                debug!(pipeline = %id, "Registered pipeline");
                Ok(PipelineBuilder::new(pipeline))
            }
        }
    }

    /// Returns a runner for the pipeline registered under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IdNotFound`] if no pipeline has that id.
    pub fn get(&self, id: impl AsRef<str>) -> Result<PipelineRunner, PipelineError> {
        let id = id.as_ref();
        self.pipeline(id)
            .map(|pipeline| PipelineRunner::new(pipeline, self.clone()))
            .ok_or_else(|| PipelineError::id_not_found(id))
    }

    /// Returns the pipeline registered under `id`, if any.
    #[must_use]
    pub fn pipeline(&self, id: &str) -> Option<Arc<Pipeline>> {
        self.inner
            .pipelines
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Copies every registration of `other` into this group.
    ///
    /// Imported pipelines keep their original owning group.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IdAlreadyExists`] naming the first colliding id.
    /// A failed import leaves this group unchanged.
    pub fn import(&self, other: &Self) -> Result<(), PipelineError> {
        let entries: Vec<(String, Arc<Pipeline>)> = other
            .inner
            .pipelines
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        if let Some((id, _)) = entries
            .iter()
            .find(|(id, _)| self.inner.pipelines.contains_key(id))
        {
            return Err(PipelineError::id_already_exists(id));
        }

        let mut inserted: Vec<(String, Arc<Pipeline>)> = Vec::with_capacity(entries.len());
        for (id, pipeline) in entries {
            let vacant = match self.inner.pipelines.entry(id.clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(&pipeline));
                    true
                }
            };

            if !vacant {
                // A concurrent registration took the id after validation.
                self.rollback(&inserted);
                return Err(PipelineError::id_already_exists(id));
            }
            inserted.push((id, pipeline));
        }

        info!(imported = inserted.len(), "Imported pipelines");
        Ok(())
    }

    /// Builds a [`PipelineModule`] in a fresh group and imports it.
    pub fn import_module<M: PipelineModule>(&self) -> Result<(), PipelineError> {
        let module = Self::with_config(self.config().clone());
        M::configure(&module)?;
        self.import(&module)
    }

    fn rollback(&self, inserted: &[(String, Arc<Pipeline>)]) {
        for (id, pipeline) in inserted {
            self.inner
                .pipelines
                .remove_if(id, |_, existing| Arc::ptr_eq(existing, pipeline));
        }
    }

    /// Returns a snapshot of the registered ids, in no particular order.
    #[must_use]
    pub fn registered_ids(&self) -> Vec<String> {
        self.inner
            .pipelines
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Returns whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: impl AsRef<str>) -> bool {
        self.inner.pipelines.contains_key(id.as_ref())
    }

    /// Returns the number of registered pipelines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.pipelines.len()
    }

    /// Returns whether the group has no pipelines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.pipelines.is_empty()
    }

    /// Runs the pipeline registered under `id` to completion.
    pub async fn run(
        &self,
        id: impl AsRef<str>,
        input: Value,
    ) -> Result<PipelineResult, PipelineError> {
        let runner = self.get(id)?;
        Ok(runner.run(input).await)
    }

    /// Streams the per-stage outputs of the pipeline registered under `id`.
    pub fn stream(&self, id: impl AsRef<str>, input: Value) -> Result<PipelineStream, PipelineError> {
        Ok(self.get(id)?.stream(input))
    }
}

impl Default for PipelineGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PipelineGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids = self.registered_ids();
        ids.sort();
        f.debug_struct("PipelineGroup")
            .field("pipelines", &ids)
            .field("config", &self.inner.config)
            .finish()
    }
}
