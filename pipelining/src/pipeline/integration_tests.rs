//! End-to-end tests over registered text pipelines.

#[cfg(test)]
mod tests {
    use crate::cancellation::CancellationToken;
    use crate::config::GroupConfig;
    use crate::errors::{PipeError, PipelineError};
    use crate::events::CollectingEventSink;
    use crate::pipeline::{PipelineGroup, RunStatus};
    use crate::testing::{
        assert_run_failed_at, assert_run_succeeded, assert_stage_pipes, assert_stage_timing,
        ExceptionPipe, PanickingPipe, RecordingPipe, TextPipelines,
    };
    use futures::{StreamExt, TryStreamExt};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    const TAMAGOTCHI: &str = "The Tamagotchi (たまごっち) is a handheld digital pet, created in Japan by Akihiro Yokoi of
                WiZ and Aki Maita of Bandai.";

    const KEYWORD_STAGES: [&str; 6] = [
        "RemoveNonAlphaPipe",
        "RemoveCasePipe",
        "SplitIntoWordsPipe",
        "DeduplicateWordsPipe",
        "RemoveStopWordsPipe",
        "SortAlphabeticallyPipe",
    ];

    fn words(items: &[&str]) -> Value {
        json!(items)
    }

    fn keywords() -> Value {
        words(&[
            "aki", "akihiro", "bandai", "created", "digital", "handheld", "japan", "maita", "pet",
            "tamagotchi", "wiz", "yokoi",
        ])
    }

    fn text_group() -> PipelineGroup {
        PipelineGroup::from_module::<TextPipelines>().unwrap()
    }

    #[tokio::test]
    async fn test_empty_pipeline() {
        let result = text_group().run("empty", json!(TAMAGOTCHI)).await.unwrap();

        assert!(result.success);
        assert!(result.output.is_none());
        assert_eq!(result.elapsed, Duration::ZERO);
        assert!(result.stages.is_empty());
    }

    #[tokio::test]
    async fn test_sanitize_input() {
        let result = text_group()
            .run("sanitize_input", json!(TAMAGOTCHI))
            .await
            .unwrap();

        assert_run_succeeded(&result);
        assert_eq!(
            result.output,
            Some(json!(
                "the tamagotchi is a handheld digital pet created in japan by akihiro yokoi of wiz and aki maita of bandai"
            ))
        );
        assert_stage_pipes(&result, &["RemoveNonAlphaPipe", "RemoveCasePipe"]);
    }

    #[tokio::test]
    async fn test_extract_keywords() {
        let result = text_group()
            .run("extract_keywords", json!(TAMAGOTCHI))
            .await
            .unwrap();

        assert_run_succeeded(&result);
        assert_eq!(result.output, Some(keywords()));
        assert_stage_pipes(&result, &KEYWORD_STAGES);
        assert_stage_timing(&result);
    }

    #[tokio::test]
    async fn test_short_text_records_every_stage() {
        let result = text_group()
            .run("extract_keywords", json!("Some text."))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output, Some(words(&["some", "text"])));
        assert_eq!(result.stages.len(), 6);
        for (index, stage) in result.stages.iter().enumerate() {
            assert_eq!(stage.index, index);
            assert_eq!(stage.pipe, KEYWORD_STAGES[index]);
            assert!(stage.started_at <= stage.ended_at);
            assert!(stage.error.is_none());
        }
    }

    #[tokio::test]
    async fn test_stream_yields_intermediate_outputs() {
        let outputs: Vec<Value> = text_group()
            .stream("extract_keywords", json!(TAMAGOTCHI))
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(
            outputs,
            vec![
                json!("The Tamagotchi is a handheld digital pet created in Japan by Akihiro Yokoi of WiZ and Aki Maita of Bandai"),
                json!("the tamagotchi is a handheld digital pet created in japan by akihiro yokoi of wiz and aki maita of bandai"),
                words(&[
                    "the", "tamagotchi", "is", "a", "handheld", "digital", "pet", "created", "in",
                    "japan", "by", "akihiro", "yokoi", "of", "wiz", "and", "aki", "maita", "of",
                    "bandai",
                ]),
                words(&[
                    "the", "tamagotchi", "is", "a", "handheld", "digital", "pet", "created", "in",
                    "japan", "by", "akihiro", "yokoi", "of", "wiz", "and", "aki", "maita", "bandai",
                ]),
                words(&[
                    "tamagotchi", "handheld", "digital", "pet", "created", "japan", "akihiro",
                    "yokoi", "wiz", "aki", "maita", "bandai",
                ]),
                keywords(),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_matches_eager_output() {
        let group = text_group();
        let eager = group
            .run("extract_keywords", json!(TAMAGOTCHI))
            .await
            .unwrap();
        let last = group
            .stream("extract_keywords", json!(TAMAGOTCHI))
            .unwrap()
            .try_fold(None, |_, value| async move { Ok(Some(value)) })
            .await
            .unwrap();

        assert_eq!(eager.output, last);
    }

    #[tokio::test]
    async fn test_failing_stage_stops_run() {
        let result = text_group()
            .run("extract_keywords_exception", json!(TAMAGOTCHI))
            .await
            .unwrap();

        assert_run_failed_at(&result, 2);
        assert_stage_pipes(
            &result,
            &["RemoveNonAlphaPipe", "RemoveCasePipe", "ExceptionPipe"],
        );

        let error = result.stages[2].error.as_ref().unwrap();
        assert_eq!(error.kind, "InvalidOperation");
        assert_eq!(error.message, ExceptionPipe::MESSAGE);
        assert_eq!(
            result.output,
            Some(json!({
                "pipe": "ExceptionPipe",
                "index": 2,
                "kind": "InvalidOperation",
                "message": "Exception thrown on purpose.",
            }))
        );
    }

    #[tokio::test]
    async fn test_stages_after_failure_are_not_invoked() {
        let group = PipelineGroup::new();
        let after = Arc::new(RecordingPipe::new("after"));
        group
            .register("failing")
            .unwrap()
            .add_fn("ok", Ok)
            .add_pipe(ExceptionPipe)
            .add_shared_pipe(after.clone());

        let result = group.run("failing", json!("x")).await.unwrap();

        assert_run_failed_at(&result, 1);
        assert_eq!(after.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_failure_ends_stream() {
        let mut stream = text_group()
            .stream("extract_keywords_exception", json!(TAMAGOTCHI))
            .unwrap();

        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_ok());

        match stream.next().await {
            Some(Err(PipelineError::StageFailure(failure))) => {
                assert_eq!(failure.pipe, "ExceptionPipe");
                assert_eq!(failure.index, 2);
                assert_eq!(failure.error.message, ExceptionPipe::MESSAGE);
            }
            other => panic!("Expected a stage failure, got {other:?}"),
        }
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let group = PipelineGroup::new();
        let first = Arc::new(RecordingPipe::new("first"));
        let second = Arc::new(RecordingPipe::new("second"));
        group
            .register("lazy")
            .unwrap()
            .add_shared_pipe(first.clone())
            .add_shared_pipe(second.clone());

        let mut stream = group.stream("lazy", json!(1)).unwrap();
        assert_eq!(first.call_count(), 0);

        assert_eq!(stream.next().await.unwrap().unwrap(), json!(1));
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 0);

        drop(stream);
        assert_eq!(second.call_count(), 0);
    }

    #[tokio::test]
    async fn test_each_stream_starts_fresh() {
        let group = PipelineGroup::new();
        let pipe = Arc::new(RecordingPipe::new("recorder"));
        group
            .register("recorded")
            .unwrap()
            .add_shared_pipe(pipe.clone());
        let runner = group.get("recorded").unwrap();

        let first: Vec<Value> = runner.stream(json!("a")).try_collect().await.unwrap();
        let second: Vec<Value> = runner.stream(json!("b")).try_collect().await.unwrap();

        assert_eq!(first, vec![json!("a")]);
        assert_eq!(second, vec![json!("b")]);
        assert_eq!(pipe.inputs(), vec![json!("a"), json!("b")]);
    }

    #[tokio::test]
    async fn test_composite_pipeline() {
        let group = text_group();
        let composite = group
            .run("keywords_from_sanitized", json!(TAMAGOTCHI))
            .await
            .unwrap();

        assert_run_succeeded(&composite);
        assert_eq!(composite.output, Some(keywords()));
        assert_stage_pipes(
            &composite,
            &[
                "pipeline:sanitize_input",
                "SplitIntoWordsPipe",
                "DeduplicateWordsPipe",
                "RemoveStopWordsPipe",
                "SortAlphabeticallyPipe",
            ],
        );
    }

    #[tokio::test]
    async fn test_composite_sees_failure_of_inner_pipeline() {
        let group = text_group();
        group
            .register("wraps_exception")
            .unwrap()
            .add_pipeline("extract_keywords_exception");

        let result = group.run("wraps_exception", json!("text")).await.unwrap();

        assert_run_failed_at(&result, 0);
        let error = result.error().unwrap();
        assert!(error.message.contains(ExceptionPipe::MESSAGE));
    }

    #[test]
    fn test_duplicate_and_unknown_ids() {
        let group = text_group();

        assert!(matches!(
            group.register("extract_keywords"),
            Err(PipelineError::IdAlreadyExists { id }) if id == "extract_keywords"
        ));
        assert!(matches!(
            group.get("missing"),
            Err(PipelineError::IdNotFound { id }) if id == "missing"
        ));
        assert_eq!(group.pipeline("extract_keywords").unwrap().stage_count(), 6);
    }

    #[tokio::test]
    async fn test_imported_pipelines_run() {
        let group = PipelineGroup::new();
        group.import_module::<TextPipelines>().unwrap();

        let result = group
            .run("keywords_from_sanitized", json!(TAMAGOTCHI))
            .await
            .unwrap();

        assert_eq!(result.output, Some(keywords()));
    }

    #[test]
    fn test_import_collision_leaves_target_unchanged() {
        let target = PipelineGroup::new();
        target.register("sanitize_input").unwrap().add_fn("mine", Ok);
        let before = target.registered_ids();

        let err = target.import(&text_group()).unwrap_err();

        assert!(matches!(err, PipelineError::IdAlreadyExists { id } if id == "sanitize_input"));
        assert_eq!(target.registered_ids(), before);
        assert_eq!(
            target.pipeline("sanitize_input").unwrap().pipe_names(),
            vec!["mine"]
        );
    }

    #[tokio::test]
    async fn test_cancellation_between_stages() {
        let group = PipelineGroup::new();
        let token = Arc::new(CancellationToken::new());
        let trigger = Arc::clone(&token);
        let never = Arc::new(RecordingPipe::new("never"));
        group
            .register("cancellable")
            .unwrap()
            .add_fn("first", Ok)
            .add_fn("cancel", move |value| {
                trigger.cancel("user abort");
                Ok(value)
            })
            .add_shared_pipe(never.clone());

        let runner = group
            .get("cancellable")
            .unwrap()
            .with_cancellation(Arc::clone(&token));
        let result = runner.run(json!("v")).await;

        assert_eq!(result.status, RunStatus::Cancelled);
        assert!(!result.success);
        assert_eq!(result.output, Some(json!("v")));
        assert_eq!(result.stages.len(), 2);
        assert_eq!(never.call_count(), 0);

        let items: Vec<Result<Value, PipelineError>> = runner.stream(json!("v")).collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(
            &items[0],
            Err(PipelineError::Cancelled { completed_stages: 0, reason, .. }) if reason == "user abort"
        ));
    }

    #[tokio::test]
    async fn test_panicking_pipe_is_captured() {
        let group = PipelineGroup::new();
        group
            .register("panics")
            .unwrap()
            .add_fn("ok", Ok)
            .add_pipe(PanickingPipe::new("boom", "kaboom"));

        let result = group.run("panics", json!(1)).await.unwrap();

        assert_run_failed_at(&result, 1);
        let error = result.error().unwrap();
        assert_eq!(error.kind, "Panic");
        assert_eq!(error.message, "kaboom");
    }

    #[tokio::test]
    async fn test_recursion_limit() {
        let group = PipelineGroup::with_config(GroupConfig::new().with_max_depth(4));
        group.register("loop").unwrap().add_pipeline("loop");

        let result = group.run("loop", json!(0)).await.unwrap();

        assert_run_failed_at(&result, 0);
        assert_eq!(result.error().unwrap().kind, "RecursionLimit");
    }

    #[tokio::test]
    async fn test_events_follow_run_lifecycle() {
        let sink = Arc::new(CollectingEventSink::new());
        let group = text_group().with_event_sink(sink.clone());

        group
            .run("sanitize_input", json!("Hi there"))
            .await
            .unwrap();

        assert_eq!(
            sink.event_types(),
            vec![
                "pipeline.started",
                "stage.started",
                "stage.completed",
                "stage.started",
                "stage.completed",
                "pipeline.completed",
            ]
        );

        sink.clear();
        group
            .run("extract_keywords_exception", json!("Hi there"))
            .await
            .unwrap();

        let failed = sink.events_of_type("stage.failed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].as_ref().unwrap()["index"], 2);
        assert_eq!(sink.events_of_type("pipeline.failed").len(), 1);
        assert!(sink.events_of_type("pipeline.completed").is_empty());
    }

    #[tokio::test]
    async fn test_stream_emits_run_lifecycle() {
        let sink = Arc::new(CollectingEventSink::new());
        let group = text_group().with_event_sink(sink.clone());

        let outputs: Vec<Value> = group
            .stream("sanitize_input", json!("Hi there"))
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(outputs.len(), 2);
        assert_eq!(
            sink.event_types(),
            vec![
                "pipeline.started",
                "stage.started",
                "stage.completed",
                "stage.started",
                "stage.completed",
                "pipeline.completed",
            ]
        );
        let completed = sink.events_of_type("pipeline.completed");
        assert_eq!(completed[0].as_ref().unwrap()["stages"], 2);

        sink.clear();
        let items: Vec<Result<Value, PipelineError>> = group
            .stream("extract_keywords_exception", json!("Hi there"))
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        assert_eq!(sink.events_of_type("pipeline.started").len(), 1);
        let failed = sink.events_of_type("pipeline.failed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].as_ref().unwrap()["failed_stage"], 2);
        assert!(sink.events_of_type("pipeline.completed").is_empty());
    }

    #[tokio::test]
    async fn test_stream_emits_cancelled_event() {
        let sink = Arc::new(CollectingEventSink::new());
        let group = PipelineGroup::new().with_event_sink(sink.clone());
        group.register("two").unwrap().add_fn("a", Ok).add_fn("b", Ok);

        let token = Arc::new(CancellationToken::new());
        let mut stream = group
            .get("two")
            .unwrap()
            .with_cancellation(Arc::clone(&token))
            .stream(json!(1));

        assert_eq!(stream.next().await.unwrap().unwrap(), json!(1));
        token.cancel("shutdown");
        assert!(matches!(
            stream.next().await,
            Some(Err(PipelineError::Cancelled { completed_stages: 1, .. }))
        ));
        assert!(stream.next().await.is_none());

        let cancelled = sink.events_of_type("pipeline.cancelled");
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].as_ref().unwrap()["reason"], "shutdown");
        assert!(sink.events_of_type("pipeline.completed").is_empty());
    }

    /// `outer` runs `inner` as its first stage; `inner` cancels the token in its first stage.
    fn nested_cancellation_group(
        token: &Arc<CancellationToken>,
    ) -> (PipelineGroup, Arc<RecordingPipe>, Arc<RecordingPipe>) {
        let group = PipelineGroup::new();
        let trigger = Arc::clone(token);
        let after = Arc::new(RecordingPipe::new("after"));
        let tail = Arc::new(RecordingPipe::new("tail"));

        group
            .register("inner")
            .unwrap()
            .add_fn("cancel", move |value| {
                trigger.cancel("user abort");
                Ok(value)
            })
            .add_shared_pipe(after.clone());
        group
            .register("outer")
            .unwrap()
            .add_pipeline("inner")
            .add_shared_pipe(tail.clone());

        (group, after, tail)
    }

    #[tokio::test]
    async fn test_cancellation_inside_nested_pipeline() {
        let token = Arc::new(CancellationToken::new());
        let (group, after, tail) = nested_cancellation_group(&token);

        let result = group
            .get("outer")
            .unwrap()
            .with_cancellation(Arc::clone(&token))
            .run(json!("v"))
            .await;

        assert_eq!(result.status, RunStatus::Cancelled);
        assert!(!result.success);
        assert_eq!(result.output, Some(json!("v")));
        assert_eq!(result.stages.len(), 1);
        assert!(result.stages[0].error.as_ref().unwrap().is_cancellation());
        assert_eq!(after.call_count(), 0);
        assert_eq!(tail.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_cancellation_inside_nested_pipeline() {
        let token = Arc::new(CancellationToken::new());
        let (group, _after, tail) = nested_cancellation_group(&token);

        let items: Vec<Result<Value, PipelineError>> = group
            .get("outer")
            .unwrap()
            .with_cancellation(Arc::clone(&token))
            .stream(json!("v"))
            .collect()
            .await;

        assert_eq!(items.len(), 1);
        assert!(matches!(
            &items[0],
            Err(PipelineError::Cancelled { completed_stages: 0, reason, .. }) if reason == "user abort"
        ));
        assert_eq!(tail.call_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_registration_leaves_first_runnable() {
        let group = text_group();
        assert!(group.register("sanitize_input").is_err());

        let result = group
            .run("sanitize_input", json!("Hello,   World!"))
            .await
            .unwrap();

        assert_run_succeeded(&result);
        assert_eq!(result.output, Some(json!("hello world")));
        assert_stage_pipes(&result, &["RemoveNonAlphaPipe", "RemoveCasePipe"]);
    }

    #[tokio::test]
    async fn test_stream_empty_pipeline_yields_nothing() {
        let sink = Arc::new(CollectingEventSink::new());
        let group = text_group().with_event_sink(sink.clone());

        let items: Vec<Result<Value, PipelineError>> = group
            .stream("empty", json!(TAMAGOTCHI))
            .unwrap()
            .collect()
            .await;

        assert!(items.is_empty());
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn test_stream_composite_pipeline() {
        let outputs: Vec<Value> = text_group()
            .stream("keywords_from_sanitized", json!(TAMAGOTCHI))
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(outputs.len(), 5);
        assert_eq!(
            outputs[0],
            json!("the tamagotchi is a handheld digital pet created in japan by akihiro yokoi of wiz and aki maita of bandai")
        );
        assert_eq!(outputs[4], keywords());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_are_independent() {
        let runner = text_group().get("extract_keywords").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let runner = runner.clone();
                tokio::spawn(async move { runner.run(json!(TAMAGOTCHI)).await })
            })
            .collect();

        let mut run_ids = Vec::new();
        for handle in handles {
            let result = handle.await.unwrap();
            assert_eq!(result.output, Some(keywords()));
            run_ids.push(result.run_id);
        }
        run_ids.sort();
        run_ids.dedup();
        assert_eq!(run_ids.len(), 8);
    }

    #[test]
    fn test_blocking_run_outside_runtime() {
        let group = text_group();

        let blocking = group
            .get("extract_keywords")
            .unwrap()
            .run_blocking(json!(TAMAGOTCHI));
        let awaited = tokio_test::block_on(group.run("extract_keywords", json!(TAMAGOTCHI))).unwrap();

        assert_eq!(blocking.output, awaited.output);
    }

    #[tokio::test]
    async fn test_wrong_input_type_fails_first_stage() {
        let result = text_group()
            .run("extract_keywords", json!(42))
            .await
            .unwrap();

        assert_run_failed_at(&result, 0);
        assert_eq!(result.error().unwrap(), &PipeError::invalid_input("string", &json!(42)));
    }
}
