//! Test assertions for run results.

use crate::pipeline::{PipelineResult, RunStatus};

/// Asserts that the run completed with every stage succeeding.
pub fn assert_run_succeeded(result: &PipelineResult) {
    assert!(
        result.success && result.status == RunStatus::Completed,
        "Expected pipeline '{}' to succeed, got status {} (error: {:?})",
        result.id,
        result.status,
        result.error()
    );
    assert!(
        result.stages.iter().all(|stage| stage.error.is_none()),
        "Successful run of '{}' carries a failed stage",
        result.id
    );
}

/// Asserts that the run failed at `index` and executed nothing after it.
pub fn assert_run_failed_at(result: &PipelineResult, index: usize) {
    assert!(
        !result.success && result.status == RunStatus::Failed,
        "Expected pipeline '{}' to fail, got status {}",
        result.id,
        result.status
    );
    assert_eq!(
        result.stages.len(),
        index + 1,
        "Expected {} executed stage(s), got {}",
        index + 1,
        result.stages.len()
    );
    assert!(
        result.stages[index].error.is_some(),
        "Expected stage {index} to carry an error"
    );
    assert!(
        result.stages[..index].iter().all(|stage| stage.error.is_none()),
        "Expected stages before {index} to succeed"
    );
}

/// Asserts the identity tags of the executed stages, in order.
pub fn assert_stage_pipes(result: &PipelineResult, expected: &[&str]) {
    let actual: Vec<&str> = result.stages.iter().map(|stage| stage.pipe.as_str()).collect();
    assert_eq!(actual, expected, "Unexpected stage pipes for '{}'", result.id);
}

/// Asserts that stage timestamps are ordered and consecutive stages do not overlap.
pub fn assert_stage_timing(result: &PipelineResult) {
    for stage in &result.stages {
        assert!(
            stage.started_at <= stage.ended_at,
            "Stage {} ('{}') ended before it started",
            stage.index,
            stage.pipe
        );
    }
    for pair in result.stages.windows(2) {
        assert!(
            pair[0].ended_at <= pair[1].started_at,
            "Stage {} started before stage {} ended",
            pair[1].index,
            pair[0].index
        );
    }
}
