//! Session stage transitions.
//!
//! Each function runs one user-triggered stage against a locked [`SessionState`]: it checks the
//! stage input, calls the pipeline, records the result, and removes audio the result displaced.
//! Translation is the only stage whose failure is recorded instead of returned.

use crate::pipeline::service::PipelineApi;
use crate::pipeline::types::StageError;
use crate::session::SessionState;
use crate::translation::Language;
use axum::body::Bytes;
use std::path::PathBuf;

/// Upload: replace the session's document text.
pub async fn upload_document<S>(
    service: &S,
    state: &mut SessionState,
    document: Bytes,
) -> Result<(), StageError>
where
    S: PipelineApi + ?Sized,
{
    let extracted = service.extract(document).await?;
    if extracted.text.trim().is_empty() {
        tracing::warn!(
            session = %state.id(),
            pages = extracted.page_count,
            "Uploaded document contains no extractable text"
        );
    }
    let displaced = state.record_extraction(extracted);
    discard(service, displaced).await;
    Ok(())
}

/// Summarize: regenerate the summary from the extracted text.
pub async fn summarize<S>(service: &S, state: &mut SessionState) -> Result<(), StageError>
where
    S: PipelineApi + ?Sized,
{
    let input = state.summary_input()?;
    let summary = service.summarize(input).await?;
    let displaced = state.record_summary(summary);
    discard(service, displaced).await;
    Ok(())
}

/// Translate: translate the summary, showing a failure as the translated text.
pub async fn translate<S>(
    service: &S,
    state: &mut SessionState,
    language: Language,
) -> Result<(), StageError>
where
    S: PipelineApi + ?Sized,
{
    let input = state.translation_input()?;
    let outcome = service.translate(input, language).await;
    let displaced = match outcome {
        Ok(text) => state.record_translation(language, text),
        Err(error) => {
            tracing::warn!(
                session = %state.id(),
                language = language.code(),
                error = %error,
                "Translation failed; showing error text"
            );
            state.record_translation_failure(language, &error)
        }
    };
    discard(service, displaced).await;
    Ok(())
}

/// Convert to speech: voice the translated text in the translation's language.
pub async fn convert_to_speech<S>(
    service: &S,
    state: &mut SessionState,
) -> Result<PathBuf, StageError>
where
    S: PipelineApi + ?Sized,
{
    let (text, language) = state.speech_input()?;
    let path = service.synthesize(state.id(), text, language).await?;
    let displaced = state.record_audio(path.clone());
    discard(service, displaced).await;
    Ok(path)
}

/// Close: release the audio of a session that has ended.
pub async fn close_session<S>(service: &S, state: &mut SessionState)
where
    S: PipelineApi + ?Sized,
{
    let released = state.release_audio();
    discard(service, released).await;
}

async fn discard<S>(service: &S, displaced: Option<PathBuf>)
where
    S: PipelineApi + ?Sized,
{
    if let Some(path) = displaced {
        service.discard_audio(&path).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::ExtractedDocument;
    use crate::metrics::MetricsSnapshot;
    use crate::pipeline::types::PipelineError;
    use crate::session::{SessionError, SessionStage};
    use crate::translation::TranslationError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct StubPipeline {
        fail_translation: Mutex<bool>,
        summarize_calls: Mutex<usize>,
        discarded: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl PipelineApi for StubPipeline {
        async fn extract(&self, document: Bytes) -> Result<ExtractedDocument, PipelineError> {
            Ok(ExtractedDocument {
                text: String::from_utf8_lossy(&document).into_owned(),
                page_count: 1,
            })
        }

        async fn summarize(&self, text: &str) -> Result<String, PipelineError> {
            *self.summarize_calls.lock().unwrap() += 1;
            Ok(format!("summary of {text}"))
        }

        async fn translate(&self, text: &str, language: Language) -> Result<String, PipelineError> {
            if *self.fail_translation.lock().unwrap() {
                return Err(TranslationError::Unavailable("offline".into()).into());
            }
            Ok(format!("{}:{text}", language.code()))
        }

        async fn synthesize(
            &self,
            session: Uuid,
            _text: &str,
            language: Language,
        ) -> Result<PathBuf, PipelineError> {
            Ok(PathBuf::from(format!(
                "audio/{session}-{}-{}.mp3",
                language.code(),
                Uuid::new_v4()
            )))
        }

        async fn discard_audio(&self, path: &Path) {
            self.discarded.lock().unwrap().push(path.to_path_buf());
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot::default()
        }
    }

    fn session() -> SessionState {
        SessionState::new(Uuid::new_v4())
    }

    #[tokio::test]
    async fn summarize_without_text_never_reaches_model() {
        let service = StubPipeline::default();
        let mut state = session();
        upload_document(&service, &mut state, Bytes::from_static(b"   "))
            .await
            .expect("upload");

        let error = summarize(&service, &mut state).await.unwrap_err();
        assert!(matches!(
            error,
            StageError::Session(SessionError::NoExtractedText)
        ));
        assert_eq!(*service.summarize_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn full_run_reaches_audio_ready() {
        let service = StubPipeline::default();
        let mut state = session();

        upload_document(&service, &mut state, Bytes::from_static(b"Hello world."))
            .await
            .expect("upload");
        summarize(&service, &mut state).await.expect("summary");
        translate(&service, &mut state, Language::Hindi)
            .await
            .expect("translation");
        let path = convert_to_speech(&service, &mut state)
            .await
            .expect("audio");

        assert_eq!(state.summary(), "summary of Hello world.");
        assert_eq!(
            state.translation().map(|t| t.text.as_str()),
            Some("hi:summary of Hello world.")
        );
        assert_eq!(state.audio(), Some(path.as_path()));
        assert_eq!(state.stage(), SessionStage::AudioReady);
    }

    #[tokio::test]
    async fn translation_failure_is_recorded_not_returned() {
        let service = StubPipeline {
            fail_translation: Mutex::new(true),
            ..StubPipeline::default()
        };
        let mut state = session();
        upload_document(&service, &mut state, Bytes::from_static(b"Text."))
            .await
            .expect("upload");
        summarize(&service, &mut state).await.expect("summary");

        translate(&service, &mut state, Language::Telugu)
            .await
            .expect("failure is displayed, not raised");
        let translation = state.translation().expect("translation");
        assert!(translation.failed);
        assert!(translation.text.starts_with("Translation error:"));
        assert_eq!(translation.language, Language::Telugu);
    }

    #[tokio::test]
    async fn regenerated_audio_discards_previous_file() {
        let service = StubPipeline::default();
        let mut state = session();
        upload_document(&service, &mut state, Bytes::from_static(b"Text."))
            .await
            .expect("upload");
        summarize(&service, &mut state).await.expect("summary");
        translate(&service, &mut state, Language::Tamil)
            .await
            .expect("translation");

        let first = convert_to_speech(&service, &mut state)
            .await
            .expect("first");
        let second = convert_to_speech(&service, &mut state)
            .await
            .expect("second");

        assert_ne!(first, second);
        assert_eq!(*service.discarded.lock().unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn speech_requires_translation() {
        let service = StubPipeline::default();
        let mut state = session();
        let error = convert_to_speech(&service, &mut state).await.unwrap_err();
        assert!(matches!(
            error,
            StageError::Session(SessionError::NoTranslation)
        ));
    }

    #[tokio::test]
    async fn translate_without_summary_is_refused() {
        let service = StubPipeline::default();
        let mut state = session();
        upload_document(&service, &mut state, Bytes::from_static(b"Text."))
            .await
            .expect("upload");

        let error = translate(&service, &mut state, Language::Hindi)
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            StageError::Session(SessionError::NoSummary)
        ));
        assert!(state.translation().is_none());
    }

    #[tokio::test]
    async fn retranslation_replaces_failure_and_discards_its_audio() {
        let service = StubPipeline {
            fail_translation: Mutex::new(true),
            ..StubPipeline::default()
        };
        let mut state = session();
        upload_document(&service, &mut state, Bytes::from_static(b"Text."))
            .await
            .expect("upload");
        summarize(&service, &mut state).await.expect("summary");
        translate(&service, &mut state, Language::Kannada)
            .await
            .expect("failure is displayed");
        let voiced_error = convert_to_speech(&service, &mut state)
            .await
            .expect("audio");

        *service.fail_translation.lock().unwrap() = false;
        translate(&service, &mut state, Language::Kannada)
            .await
            .expect("translation");

        let translation = state.translation().expect("translation");
        assert!(!translation.failed);
        assert_eq!(translation.text, "kn:summary of Text.");
        assert!(state.audio().is_none());
        assert_eq!(*service.discarded.lock().unwrap(), vec![voiced_error]);
    }

    #[tokio::test]
    async fn closing_session_discards_its_audio() {
        let service = StubPipeline::default();
        let mut state = session();
        upload_document(&service, &mut state, Bytes::from_static(b"Text."))
            .await
            .expect("upload");
        summarize(&service, &mut state).await.expect("summary");
        translate(&service, &mut state, Language::Malayalam)
            .await
            .expect("translation");
        let path = convert_to_speech(&service, &mut state)
            .await
            .expect("audio");

        close_session(&service, &mut state).await;
        assert!(state.audio().is_none());
        assert_eq!(*service.discarded.lock().unwrap(), vec![path]);

        close_session(&service, &mut state).await;
        assert_eq!(service.discarded.lock().unwrap().len(), 1);
    }
}
