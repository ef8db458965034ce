//! # Pipelining
//!
//! Named, ordered processing pipelines with per-stage telemetry.
//!
//! A pipeline is a sequence of pipes applied one after another to an input
//! value. Pipelines are registered by id into a [`PipelineGroup`](pipeline::PipelineGroup),
//! groups can import each other's registrations, and a pipe may itself run
//! another registered pipeline.
//!
//! - **Eager runs** return a [`PipelineResult`](pipeline::PipelineResult) with the
//!   final output, a success flag, elapsed time and one record per executed stage
//! - **Streaming runs** yield each stage's output as soon as it is produced
//! - **Failure containment**: the first failing stage stops the run and is
//!   recorded with its captured error
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipelining::prelude::*;
//!
//! let group = PipelineGroup::new();
//! group
//!     .register("shout")?
//!     .add_fn("trim", |v| Ok(json!(v.as_str().unwrap_or_default().trim())))
//!     .add_fn("upper", |v| Ok(json!(v.as_str().unwrap_or_default().to_uppercase())));
//!
//! let result = group.get("shout")?.run(json!("  hi ")).await;
//! assert_eq!(result.output, Some(json!("HI")));
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod pipes;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::GroupConfig;
    pub use crate::errors::{PipeError, PipelineError, StageFailure};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_logging, LogFormat, LoggingConfig};
    pub use crate::pipeline::{
        PipelineBuilder, PipelineGroup, PipelineModule, PipelineResult, PipelineRunner,
        PipelineStream, RunStatus, StageResult,
    };
    pub use crate::pipes::{AsyncFnPipe, FnPipe, IdentityPipe, Pipe, PipeContext, SubPipeline};
    pub use serde_json::{json, Value};
}
