//! Run lifecycle events.
//!
//! Runners emit `pipeline.*` and `stage.*` events with JSON payloads to the
//! sink configured on the group the run was started from.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
