//! Text-processing fixture pipes and pipelines.
//!
//! A sanitizing pipeline turns free text into lowercase letters and single
//! spaces; the keyword pipelines continue from there to a sorted list of
//! distinct, non-stop-word terms.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

use crate::errors::{PipeError, PipelineError};
use crate::pipeline::{PipelineGroup, PipelineModule};
use crate::pipes::{Pipe, PipeContext};

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "if", "in", "is", "it",
    "its", "of", "on", "or", "so", "that", "the", "this", "to", "was", "were", "with",
];

#[allow(clippy::unwrap_used)]
static NON_ALPHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z\s]").unwrap());
#[allow(clippy::unwrap_used)]
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn text_input(input: &Value) -> Result<&str, PipeError> {
    input
        .as_str()
        .ok_or_else(|| PipeError::invalid_input("string", input))
}

fn word_input(input: Value) -> Result<Vec<String>, PipeError> {
    match input {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(word) => Ok(word),
                other => Err(PipeError::invalid_input("string", &other)),
            })
            .collect(),
        other => Err(PipeError::invalid_input("array of strings", &other)),
    }
}

fn word_output(words: Vec<String>) -> Value {
    Value::Array(words.into_iter().map(Value::String).collect())
}

/// Strips everything but ASCII letters and whitespace, then collapses whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveNonAlphaPipe;

#[async_trait]
impl Pipe for RemoveNonAlphaPipe {
    fn name(&self) -> &str {
        "RemoveNonAlphaPipe"
    }

    async fn apply(&self, input: Value, _ctx: &PipeContext) -> Result<Value, PipeError> {
        let text = text_input(&input)?;
        let letters = NON_ALPHA.replace_all(text, "");
        let collapsed = WHITESPACE.replace_all(&letters, " ");
        Ok(Value::String(collapsed.trim().to_string()))
    }
}

/// Lowercases text.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveCasePipe;

#[async_trait]
impl Pipe for RemoveCasePipe {
    fn name(&self) -> &str {
        "RemoveCasePipe"
    }

    async fn apply(&self, input: Value, _ctx: &PipeContext) -> Result<Value, PipeError> {
        Ok(Value::String(text_input(&input)?.to_lowercase()))
    }
}

/// Splits text on whitespace into a word list.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitIntoWordsPipe;

#[async_trait]
impl Pipe for SplitIntoWordsPipe {
    fn name(&self) -> &str {
        "SplitIntoWordsPipe"
    }

    async fn apply(&self, input: Value, _ctx: &PipeContext) -> Result<Value, PipeError> {
        let words = text_input(&input)?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        Ok(word_output(words))
    }
}

/// Drops repeated words, keeping the first occurrence.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeduplicateWordsPipe;

#[async_trait]
impl Pipe for DeduplicateWordsPipe {
    fn name(&self) -> &str {
        "DeduplicateWordsPipe"
    }

    async fn apply(&self, input: Value, _ctx: &PipeContext) -> Result<Value, PipeError> {
        let mut seen = HashSet::new();
        let words = word_input(input)?
            .into_iter()
            .filter(|word| seen.insert(word.clone()))
            .collect();
        Ok(word_output(words))
    }
}

/// Drops common English stop words.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveStopWordsPipe;

#[async_trait]
impl Pipe for RemoveStopWordsPipe {
    fn name(&self) -> &str {
        "RemoveStopWordsPipe"
    }

    async fn apply(&self, input: Value, _ctx: &PipeContext) -> Result<Value, PipeError> {
        let words = word_input(input)?
            .into_iter()
            .filter(|word| !STOP_WORDS.contains(&word.as_str()))
            .collect();
        Ok(word_output(words))
    }
}

/// Sorts words alphabetically.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortAlphabeticallyPipe;

#[async_trait]
impl Pipe for SortAlphabeticallyPipe {
    fn name(&self) -> &str {
        "SortAlphabeticallyPipe"
    }

    async fn apply(&self, input: Value, _ctx: &PipeContext) -> Result<Value, PipeError> {
        let mut words = word_input(input)?;
        words.sort();
        Ok(word_output(words))
    }
}

/// Always fails with an `InvalidOperation` error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionPipe;

impl ExceptionPipe {
    /// The message of the error this pipe raises.
    pub const MESSAGE: &'static str = "Exception thrown on purpose.";
}

#[async_trait]
impl Pipe for ExceptionPipe {
    fn name(&self) -> &str {
        "ExceptionPipe"
    }

    async fn apply(&self, _input: Value, _ctx: &PipeContext) -> Result<Value, PipeError> {
        Err(PipeError::invalid_operation(Self::MESSAGE))
    }
}

/// Text pipelines used throughout the test suite.
///
/// Registers `empty`, `sanitize_input`, `extract_keywords`,
/// `extract_keywords_exception` and the composite `keywords_from_sanitized`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextPipelines;

impl PipelineModule for TextPipelines {
    fn configure(group: &PipelineGroup) -> Result<(), PipelineError> {
        group.register("empty")?;

        group
            .register("sanitize_input")?
            .add_pipe(RemoveNonAlphaPipe)
            .add_pipe(RemoveCasePipe);

        group
            .register("extract_keywords")?
            .add_pipe(RemoveNonAlphaPipe)
            .add_pipe(RemoveCasePipe)
            .add_pipe(SplitIntoWordsPipe)
            .add_pipe(DeduplicateWordsPipe)
            .add_pipe(RemoveStopWordsPipe)
            .add_pipe(SortAlphabeticallyPipe);

        group
            .register("extract_keywords_exception")?
            .add_pipe(RemoveNonAlphaPipe)
            .add_pipe(RemoveCasePipe)
            .add_pipe(ExceptionPipe)
            .add_pipe(SplitIntoWordsPipe)
            .add_pipe(DeduplicateWordsPipe)
            .add_pipe(RemoveStopWordsPipe)
            .add_pipe(SortAlphabeticallyPipe);

        group
            .register("keywords_from_sanitized")?
            .add_pipeline("sanitize_input")
            .add_pipe(SplitIntoWordsPipe)
            .add_pipe(DeduplicateWordsPipe)
            .add_pipe(RemoveStopWordsPipe)
            .add_pipe(SortAlphabeticallyPipe);

        Ok(())
    }
}
