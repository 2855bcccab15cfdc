//! Pipeline service coordinating extraction, summarization, translation, and speech.

use crate::{
    config::get_config,
    extraction::{self, ExtractedDocument},
    metrics::{MetricsSnapshot, PipelineMetrics},
    pipeline::types::PipelineError,
    speech::{AudioStore, SpeechClient, get_speech_client},
    summarization::{
        GenerationParams, MAX_INPUT_TOKENS, SummarizationClient, SummarizationRequest,
        SummarizerModel, format_summary, get_summarization_client, load_model,
    },
    translation::{Language, TranslationClient, get_translation_client},
};
use async_trait::async_trait;
use axum::body::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Owns the long-lived model handle and service clients shared by every session.
///
/// Construct the service once near process start and share it through an `Arc`.
pub struct PipelineService {
    model: Arc<SummarizerModel>,
    summarizer: Box<dyn SummarizationClient>,
    translator: Box<dyn TranslationClient>,
    speech: Box<dyn SpeechClient>,
    audio: AudioStore,
    metrics: Arc<PipelineMetrics>,
}

/// Abstraction over the pipeline used by the HTTP surface.
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Extract the text of an uploaded PDF.
    async fn extract(&self, document: Bytes) -> Result<ExtractedDocument, PipelineError>;

    /// Summarize document text and format the result for display.
    async fn summarize(&self, text: &str) -> Result<String, PipelineError>;

    /// Translate a summary into `language`.
    async fn translate(&self, text: &str, language: Language) -> Result<String, PipelineError>;

    /// Voice `text` in `language` and store the audio for `session`.
    async fn synthesize(
        &self,
        session: Uuid,
        text: &str,
        language: Language,
    ) -> Result<PathBuf, PipelineError>;

    /// Remove an audio file that is no longer referenced.
    async fn discard_audio(&self, path: &Path);

    /// Retrieve the current metrics snapshot.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl PipelineService {
    /// Build the service from configuration, loading the model tokenizer once.
    pub async fn new() -> Result<Self, PipelineError> {
        let config = get_config();
        tracing::info!(model = %config.summarizer_model, "Loading summarization model");
        let model = load_model(
            &config.summarizer_model,
            config.summarizer_tokenizer_path.as_deref(),
        )
        .await?;

        Ok(Self::with_clients(
            model,
            get_summarization_client()?,
            get_translation_client()?,
            get_speech_client()?,
            AudioStore::new(config.audio_dir.clone()),
        ))
    }

    /// Assemble a service from explicit parts.
    pub fn with_clients(
        model: Arc<SummarizerModel>,
        summarizer: Box<dyn SummarizationClient>,
        translator: Box<dyn TranslationClient>,
        speech: Box<dyn SpeechClient>,
        audio: AudioStore,
    ) -> Self {
        Self {
            model,
            summarizer,
            translator,
            speech,
            audio,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Extract the text of an uploaded PDF on the blocking pool.
    pub async fn extract(&self, document: Bytes) -> Result<ExtractedDocument, PipelineError> {
        let size = document.len();
        let extracted = tokio::task::spawn_blocking(move || extraction::extract_text(&document))
            .await
            .map_err(|error| PipelineError::Task(error.to_string()))??;

        self.metrics.record_extraction(extracted.page_count as u64);
        tracing::info!(
            bytes = size,
            pages = extracted.page_count,
            chars = extracted.text.chars().count(),
            "Document extracted"
        );
        Ok(extracted)
    }

    /// Truncate, generate, and format a summary.
    pub async fn summarize(&self, text: &str) -> Result<String, PipelineError> {
        let params = GenerationParams::LEGAL_SUMMARY;
        let model = Arc::clone(&self.model);
        let owned = text.to_string();
        let input = tokio::task::spawn_blocking(move || {
            model.truncate_to_budget(&owned, MAX_INPUT_TOKENS)
        })
        .await
        .map_err(|error| PipelineError::Task(error.to_string()))??;

        if input.len() < text.len() {
            tracing::debug!(
                original_chars = text.chars().count(),
                kept_chars = input.chars().count(),
                max_tokens = MAX_INPUT_TOKENS,
                "Input truncated to model budget"
            );
        }

        let raw = self
            .summarizer
            .generate_summary(SummarizationRequest {
                text: input,
                params,
            })
            .await?;

        match self.model.count_tokens(&raw) {
            Ok(tokens) if !params.accepts_length(tokens) => tracing::warn!(
                tokens,
                min = params.min_length,
                max = params.max_length,
                "Generated summary length outside requested bounds"
            ),
            Ok(_) => {}
            Err(error) => tracing::debug!(error = %error, "Could not measure summary length"),
        }

        let summary = format_summary(&raw);
        self.metrics.record_summary();
        tracing::info!(
            model = self.model.model_id(),
            chars = summary.chars().count(),
            "Summary generated"
        );
        Ok(summary)
    }

    /// Translate text, counting successes and failures.
    pub async fn translate(&self, text: &str, language: Language) -> Result<String, PipelineError> {
        let outcome = self.translator.translate(text, language).await;
        self.metrics.record_translation(outcome.is_ok());
        let translated = outcome?;
        tracing::info!(
            language = language.code(),
            chars = translated.chars().count(),
            "Summary translated"
        );
        Ok(translated)
    }

    /// Synthesize speech and write it to a fresh file.
    pub async fn synthesize(
        &self,
        session: Uuid,
        text: &str,
        language: Language,
    ) -> Result<PathBuf, PipelineError> {
        let audio = self.speech.synthesize(text, language).await?;
        let path = self.audio.save(session, &audio).await?;
        self.metrics.record_audio();
        tracing::info!(
            session = %session,
            language = language.code(),
            bytes = audio.len(),
            path = %path.display(),
            "Audio generated"
        );
        Ok(path)
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl PipelineApi for PipelineService {
    async fn extract(&self, document: Bytes) -> Result<ExtractedDocument, PipelineError> {
        PipelineService::extract(self, document).await
    }

    async fn summarize(&self, text: &str) -> Result<String, PipelineError> {
        PipelineService::summarize(self, text).await
    }

    async fn translate(&self, text: &str, language: Language) -> Result<String, PipelineError> {
        PipelineService::translate(self, text, language).await
    }

    async fn synthesize(
        &self,
        session: Uuid,
        text: &str,
        language: Language,
    ) -> Result<PathBuf, PipelineError> {
        PipelineService::synthesize(self, session, text, language).await
    }

    async fn discard_audio(&self, path: &Path) {
        self.audio.discard(path).await;
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        PipelineService::metrics_snapshot(self)
    }
}
