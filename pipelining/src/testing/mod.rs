//! Testing utilities for pipelining.
//!
//! This module provides:
//! - Mock pipes that record calls, fail, sleep or panic
//! - Text-processing fixture pipes and a ready-made `TextPipelines` module
//! - Assertions over run results

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_run_failed_at, assert_run_succeeded, assert_stage_pipes, assert_stage_timing,
};
pub use fixtures::{
    DeduplicateWordsPipe, ExceptionPipe, RemoveCasePipe, RemoveNonAlphaPipe,
    RemoveStopWordsPipe, SortAlphabeticallyPipe, SplitIntoWordsPipe, TextPipelines,
};
pub use mocks::{FailingPipe, PanickingPipe, RecordingPipe, SlowPipe};
