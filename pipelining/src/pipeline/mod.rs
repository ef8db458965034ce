//! Pipeline registration and execution.
//!
//! This module provides:
//! - The pipeline group (a concurrent id → pipeline registry)
//! - The fluent builder used during registration
//! - The runner with eager and streaming execution
//! - Run and per-stage result types

mod builder;
mod definition;
mod group;
mod result;
mod runner;

#[cfg(test)]
mod integration_tests;

pub use builder::PipelineBuilder;
pub use definition::Pipeline;
pub use group::{GroupHandle, PipelineGroup, PipelineModule};
pub use result::{PipelineResult, RunStatus, StageResult};
pub use runner::{PipelineRunner, PipelineStream};
