//! Observability utilities.
//!
//! Runs are instrumented with `tracing` spans and events; this module installs
//! a subscriber for applications that do not bring their own.

mod logging;

pub use logging::{init_logging, LogFormat, LoggingConfig};
