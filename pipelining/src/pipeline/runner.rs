//! Pipeline runner: eager and streaming execution.
//!
//! Both modes drive the same per-stage step: invoke one pipe with the current
//! value, time it, and either hand the output to the next stage or stop.
//! Stages always run one after another, in registration order.

use super::{Pipeline, PipelineGroup, PipelineResult, StageResult};
use crate::cancellation::CancellationToken;
use crate::errors::{PipeError, PipelineError, StageFailure};
use crate::pipes::{Pipe, PipeContext};
use crate::utils::iso_timestamp;
use chrono::Utc;
use futures::future::FutureExt;
use futures::stream::{BoxStream, StreamExt};
use serde_json::{json, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info_span, warn, Instrument, Span};
use uuid::Uuid;

/// Lazy sequence of per-stage outputs produced by [`PipelineRunner::stream`].
pub type PipelineStream = BoxStream<'static, Result<Value, PipelineError>>;

/// Execution handle bound to one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    pipeline: Arc<Pipeline>,
    group: PipelineGroup,
    depth: u32,
    cancellation: Option<Arc<CancellationToken>>,
}

impl PipelineRunner {
    pub(crate) fn new(pipeline: Arc<Pipeline>, group: PipelineGroup) -> Self {
        Self {
            pipeline,
            group,
            depth: 0,
            cancellation: None,
        }
    }

    pub(crate) fn nested(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Attaches a cancellation token, checked before each stage.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Returns the pipeline id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.pipeline.id()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.pipeline.stage_count()
    }

    /// Returns the composite nesting depth of runs started by this runner.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns whether the attached token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    /// Runs every stage and returns the aggregated result.
    ///
    /// Stage failures never surface as errors here: the first failing stage
    /// ends the run and is reported through `success` and the stage list.
    pub async fn run(&self, input: Value) -> PipelineResult {
        let run_id = Uuid::new_v4();
        let span = self.span(run_id);

        self.run_stages(input, run_id).instrument(span).await
    }

    /// Runs the pipeline on the current thread, blocking until it finishes.
    ///
    /// Pipes that rely on a tokio runtime (timers, I/O) must be run with
    /// [`run`](Self::run) from inside that runtime instead.
    pub fn run_blocking(&self, input: Value) -> PipelineResult {
        futures::executor::block_on(self.run(input))
    }

    /// Returns the per-stage outputs as a lazy stream.
    ///
    /// Each poll runs the next stage and yields its output. Dropping the
    /// stream early leaves the remaining stages unexecuted and emits no
    /// terminal event. A failing stage yields [`PipelineError::StageFailure`]
    /// and ends the stream. Every call starts a fresh execution.
    pub fn stream(&self, input: Value) -> PipelineStream {
        let run_id = Uuid::new_v4();
        let state = StreamState {
            span: self.span(run_id),
            runner: self.clone(),
            pipes: self.pipeline.pipes(),
            run_id,
            started: None,
            next: 0,
            current: input,
        };

        futures::stream::try_unfold(state, |mut state| async move {
            if state.pipes.is_empty() {
                return Ok(None);
            }
            let runner = state.runner.clone();
            let (run_id, total) = (state.run_id, state.pipes.len());
            let started = *state.started.get_or_insert_with(|| {
                runner.emit_started(run_id, total);
                Instant::now()
            });

            let Some(pipe) = state.pipes.get(state.next).cloned() else {
                runner.emit_completed(state.run_id, state.next, started.elapsed());
                return Ok(None);
            };

            if let Some(reason) = runner.cancellation_reason() {
                return Err(runner.stream_cancelled(state.run_id, state.next, reason));
            }

            let input = std::mem::take(&mut state.current);
            let (stage, outcome) = runner
                .execute_stage(&pipe, state.next, input, state.run_id)
                .instrument(state.span.clone())
                .await;

            match outcome {
                Ok(value) => {
                    state.current = value.clone();
                    state.next += 1;
                    Ok(Some((value, state)))
                }
                Err(error) => {
                    if let Some(reason) = runner.nested_cancellation(&error) {
                        return Err(runner.stream_cancelled(state.run_id, state.next, reason));
                    }
                    runner.emit_failed(state.run_id, state.next, &error, started.elapsed());
                    Err(PipelineError::from(StageFailure::new(
                        stage.pipe,
                        stage.index,
                        error,
                    )))
                }
            }
        })
        .boxed()
    }

    /// Returns the per-stage outputs as a blocking iterator.
    ///
    /// Same caveat as [`run_blocking`](Self::run_blocking) for runtime-bound pipes.
    pub fn iter(&self, input: Value) -> impl Iterator<Item = Result<Value, PipelineError>> {
        futures::executor::block_on_stream(self.stream(input))
    }

    fn span(&self, run_id: Uuid) -> Span {
        info_span!(
            "pipeline.run",
            pipeline = %self.id(),
            run_id = %run_id,
            depth = self.depth,
        )
    }

    async fn run_stages(&self, input: Value, run_id: Uuid) -> PipelineResult {
        let pipes = self.pipeline.pipes();
        if pipes.is_empty() {
            debug!("Pipeline has no stages");
            return PipelineResult::empty(self.id(), run_id);
        }

        self.emit_started(run_id, pipes.len());

        let start = Instant::now();
        let mut current = input;
        let mut stages = Vec::with_capacity(pipes.len());

        for (index, pipe) in pipes.iter().enumerate() {
            if let Some(reason) = self.cancellation_reason() {
                self.emit_cancelled(run_id, index, &reason);
                return PipelineResult::cancelled(self.id(), run_id, current, start.elapsed(), stages);
            }

            // Output of a run cancelled from inside a nested pipeline.
            let last = self.cancellation.as_ref().map(|_| current.clone());
            let input = std::mem::take(&mut current);
            let (stage, outcome) = self.execute_stage(pipe, index, input, run_id).await;
            stages.push(stage);

            match outcome {
                Ok(value) => current = value,
                Err(error) => {
                    let elapsed = start.elapsed();
                    if let Some(reason) = self.nested_cancellation(&error) {
                        self.emit_cancelled(run_id, index, &reason);
                        let output = last.unwrap_or(Value::Null);
                        return PipelineResult::cancelled(self.id(), run_id, output, elapsed, stages);
                    }
                    self.emit_failed(run_id, index, &error, elapsed);
                    return PipelineResult::failed(self.id(), run_id, elapsed, stages);
                }
            }
        }

        let elapsed = start.elapsed();
        self.emit_completed(run_id, stages.len(), elapsed);

        PipelineResult::completed(self.id(), run_id, current, elapsed, stages)
    }

    /// Invokes a single pipe and records its stage result.
    async fn execute_stage(
        &self,
        pipe: &Arc<dyn Pipe>,
        index: usize,
        input: Value,
        run_id: Uuid,
    ) -> (StageResult, Result<Value, PipeError>) {
        let name = pipe.name().to_string();
        let ctx = PipeContext::new(
            self.id(),
            run_id,
            index,
            self.depth,
            self.group.clone(),
            self.pipeline.group().clone(),
            self.cancellation.clone(),
        );

        self.emit(
            "stage.started",
            json!({
                "pipeline": self.id(),
                "run_id": run_id.to_string(),
                "stage": &name,
                "index": index,
            }),
        );

        let started_at = Utc::now();
        let timer = Instant::now();

        let outcome = if self.group.config().capture_panics {
            match AssertUnwindSafe(pipe.apply(input, &ctx)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => Err(PipeError::panicked(panic_message(payload.as_ref()))),
            }
        } else {
            pipe.apply(input, &ctx).await
        };

        let ended_at = Utc::now();
        let duration_ms = timer.elapsed().as_secs_f64() * 1000.0;

        match &outcome {
            Ok(_) => {
                debug!(stage = %name, index, duration_ms, "Stage completed");
                self.emit(
                    "stage.completed",
                    json!({
                        "pipeline": self.id(),
                        "run_id": run_id.to_string(),
                        "stage": &name,
                        "index": index,
                        "duration_ms": duration_ms,
                    }),
                );
            }
            Err(error) => {
                warn!(
                    stage = %name,
                    index,
                    error_kind = %error.kind,
                    error = %error.message,
                    "Stage failed"
                );
                self.emit(
                    "stage.failed",
                    json!({
                        "pipeline": self.id(),
                        "run_id": run_id.to_string(),
                        "stage": &name,
                        "index": index,
                        "error_kind": &error.kind,
                        "error": &error.message,
                        "duration_ms": duration_ms,
                    }),
                );
            }
        }

        let error = outcome.as_ref().err().cloned();
        let stage = StageResult::new(name, index, started_at, ended_at, error);
        (stage, outcome)
    }

    fn cancellation_reason(&self) -> Option<String> {
        let token = self.cancellation.as_ref()?;
        if token.is_cancelled() {
            Some(token.reason().unwrap_or_else(|| "cancelled".to_string()))
        } else {
            None
        }
    }

    /// A stage error that reports the shared token firing inside a nested run.
    fn nested_cancellation(&self, error: &PipeError) -> Option<String> {
        if error.is_cancellation() {
            self.cancellation_reason()
        } else {
            None
        }
    }

    fn stream_cancelled(&self, run_id: Uuid, completed_stages: usize, reason: String) -> PipelineError {
        self.emit_cancelled(run_id, completed_stages, &reason);
        PipelineError::Cancelled {
            id: self.id().to_string(),
            completed_stages,
            reason,
        }
    }

    fn emit_started(&self, run_id: Uuid, stages: usize) {
        self.emit(
            "pipeline.started",
            json!({
                "pipeline": self.id(),
                "run_id": run_id.to_string(),
                "stages": stages,
                "depth": self.depth,
                "timestamp": iso_timestamp(),
            }),
        );
    }

    fn emit_completed(&self, run_id: Uuid, stages: usize, elapsed: Duration) {
        self.emit(
            "pipeline.completed",
            json!({
                "pipeline": self.id(),
                "run_id": run_id.to_string(),
                "stages": stages,
                "duration_ms": elapsed.as_secs_f64() * 1000.0,
            }),
        );
    }

    fn emit_failed(&self, run_id: Uuid, index: usize, error: &PipeError, elapsed: Duration) {
        self.emit(
            "pipeline.failed",
            json!({
                "pipeline": self.id(),
                "run_id": run_id.to_string(),
                "failed_stage": index,
                "error": error.message,
                "duration_ms": elapsed.as_secs_f64() * 1000.0,
            }),
        );
    }

    fn emit_cancelled(&self, run_id: Uuid, completed_stages: usize, reason: &str) {
        debug!(completed_stages, reason = %reason, "Pipeline cancelled");
        self.emit(
            "pipeline.cancelled",
            json!({
                "pipeline": self.id(),
                "run_id": run_id.to_string(),
                "completed_stages": completed_stages,
                "reason": reason,
            }),
        );
    }

    fn emit(&self, event_type: &str, data: Value) {
        self.group.event_sink().try_emit(event_type, Some(data));
    }
}

struct StreamState {
    span: Span,
    runner: PipelineRunner,
    pipes: Vec<Arc<dyn Pipe>>,
    run_id: Uuid,
    started: Option<Instant>,
    next: usize,
    current: Value,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "pipe panicked".to_string()
    }
}
