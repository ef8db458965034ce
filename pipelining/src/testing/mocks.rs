//! Mock pipes for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;

use crate::errors::PipeError;
use crate::pipes::{Pipe, PipeContext};

/// A pipe that records every input and returns a configurable output.
///
/// Passes its input through unchanged until an output is set.
#[derive(Debug)]
pub struct RecordingPipe {
    name: String,
    output: Mutex<Option<Value>>,
    inputs: Mutex<Vec<Value>>,
}

impl RecordingPipe {
    /// Creates a new pass-through recording pipe.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output: Mutex::new(None),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Sets the output to return instead of the input.
    pub fn set_output(&self, output: Value) {
        *self.output.lock() = Some(output);
    }

    /// Returns the number of times the pipe was applied.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Returns the recorded inputs, in call order.
    #[must_use]
    pub fn inputs(&self) -> Vec<Value> {
        self.inputs.lock().clone()
    }

    /// Resets call tracking.
    pub fn reset(&self) {
        self.inputs.lock().clear();
    }
}

#[async_trait]
impl Pipe for RecordingPipe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, input: Value, _ctx: &PipeContext) -> Result<Value, PipeError> {
        self.inputs.lock().push(input.clone());
        Ok(self.output.lock().clone().unwrap_or(input))
    }
}

/// A pipe that always fails with the same error.
#[derive(Debug, Clone)]
pub struct FailingPipe {
    name: String,
    error: PipeError,
}

impl FailingPipe {
    /// Creates a pipe failing with an `InvalidOperation` error.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_error(name, PipeError::invalid_operation(message))
    }

    /// Creates a pipe failing with the given error.
    #[must_use]
    pub fn with_error(name: impl Into<String>, error: PipeError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }
}

#[async_trait]
impl Pipe for FailingPipe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, _input: Value, _ctx: &PipeContext) -> Result<Value, PipeError> {
        Err(self.error.clone())
    }
}

/// A pass-through pipe that sleeps on the tokio timer before returning.
#[derive(Debug, Clone)]
pub struct SlowPipe {
    name: String,
    delay: Duration,
}

impl SlowPipe {
    /// Creates a new slow pipe.
    #[must_use]
    pub fn new(name: impl Into<String>, delay: Duration) -> Self {
        Self {
            name: name.into(),
            delay,
        }
    }
}

#[async_trait]
impl Pipe for SlowPipe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, input: Value, _ctx: &PipeContext) -> Result<Value, PipeError> {
        tokio::time::sleep(self.delay).await;
        Ok(input)
    }
}

/// A pipe that panics when applied.
#[derive(Debug, Clone)]
pub struct PanickingPipe {
    name: String,
    message: String,
}

impl PanickingPipe {
    /// Creates a new panicking pipe.
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Pipe for PanickingPipe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, _input: Value, _ctx: &PipeContext) -> Result<Value, PipeError> {
        panic!("{}", self.message);
    }
}
