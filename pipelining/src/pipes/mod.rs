//! Pipe trait and implementations.
//!
//! Pipes are the units of work a pipeline applies, in order, to its input.

mod composite;
mod context;

pub use composite::SubPipeline;
pub use context::PipeContext;

use crate::errors::PipeError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;

/// Trait for pipeline pipes.
///
/// A pipe transforms one value into the next and may fail. It knows nothing
/// about the pipeline it belongs to beyond what [`PipeContext`] exposes.
#[async_trait]
pub trait Pipe: Send + Sync + Debug {
    /// Returns the identity tag reported in stage results.
    fn name(&self) -> &str;

    /// Applies the transformation.
    ///
    /// # Arguments
    ///
    /// * `input` - The output of the previous stage, or the run input for the first stage
    /// * `ctx` - The stage execution context
    async fn apply(&self, input: Value, ctx: &PipeContext) -> Result<Value, PipeError>;
}

/// A pipe backed by a synchronous function.
pub struct FnPipe<F>
where
    F: Fn(Value) -> Result<Value, PipeError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnPipe<F>
where
    F: Fn(Value) -> Result<Value, PipeError> + Send + Sync,
{
    /// Creates a new function-based pipe.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnPipe<F>
where
    F: Fn(Value) -> Result<Value, PipeError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnPipe").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Pipe for FnPipe<F>
where
    F: Fn(Value) -> Result<Value, PipeError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, input: Value, _ctx: &PipeContext) -> Result<Value, PipeError> {
        (self.func)(input)
    }
}

/// A pipe backed by an async function.
pub struct AsyncFnPipe<F, Fut>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, PipeError>> + Send,
{
    name: String,
    func: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnPipe<F, Fut>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, PipeError>> + Send,
{
    /// Creates a new async function-based pipe.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Debug for AsyncFnPipe<F, Fut>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, PipeError>> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnPipe")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<F, Fut> Pipe for AsyncFnPipe<F, Fut>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, PipeError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, input: Value, _ctx: &PipeContext) -> Result<Value, PipeError> {
        (self.func)(input).await
    }
}

/// A pipe that passes its input through unchanged.
#[derive(Debug, Clone)]
pub struct IdentityPipe {
    name: String,
}

impl IdentityPipe {
    /// Creates a new identity pipe.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for IdentityPipe {
    fn default() -> Self {
        Self::new("IdentityPipe")
    }
}

#[async_trait]
impl Pipe for IdentityPipe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, input: Value, _ctx: &PipeContext) -> Result<Value, PipeError> {
        Ok(input)
    }
}
