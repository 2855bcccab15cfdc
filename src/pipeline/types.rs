//! Error definitions for the document pipeline.

use crate::{
    extraction::ExtractionError,
    session::SessionError,
    speech::SpeechError,
    summarization::{SummarizationClientError, TokenizerError},
    translation::TranslationError,
};
use thiserror::Error;

/// Errors emitted by the pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The upload could not be read as a PDF.
    #[error("Failed to extract text: {0}")]
    Extraction(#[from] ExtractionError),
    /// Input could not be measured or truncated for the model.
    #[error("Failed to prepare model input: {0}")]
    Tokenizer(#[from] TokenizerError),
    /// The model failed to produce a summary.
    #[error("Failed to summarize: {0}")]
    Summarization(#[from] SummarizationClientError),
    /// The translation service failed.
    #[error("Failed to translate: {0}")]
    Translation(#[from] TranslationError),
    /// Speech synthesis or audio storage failed.
    #[error("Failed to synthesize speech: {0}")]
    Speech(#[from] SpeechError),
    /// A blocking task was cancelled or panicked.
    #[error("Background task failed: {0}")]
    Task(String),
}

/// Errors returned when a session stage is triggered.
#[derive(Debug, Error)]
pub enum StageError {
    /// The stage's input does not exist yet.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// The stage itself failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
