//! Per-session pipeline state.
//!
//! Each browser session owns one [`SessionState`]. Every stage result replaces the previous one
//! and clears whatever was derived from it, so a new upload never shows the summary of the old
//! document. The accessors for stage inputs refuse to hand out missing or empty values.

use crate::extraction::ExtractedDocument;
use crate::translation::Language;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Prefix of the text shown in place of a failed translation.
pub const TRANSLATION_ERROR_PREFIX: &str = "Translation error: ";

/// A stage was triggered before its input exists.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Summarize needs non-empty extracted text.
    #[error("no extracted text to summarize; upload a PDF with readable text first")]
    NoExtractedText,
    /// Translate needs a summary.
    #[error("no summary to translate; summarize the document first")]
    NoSummary,
    /// Speech needs a translation.
    #[error("no translated text to convert; translate the summary first")]
    NoTranslation,
    /// Playback needs generated audio.
    #[error("no audio has been generated for this session")]
    NoAudio,
}

/// Furthest stage a session has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    /// Nothing uploaded yet.
    Idle,
    /// Text extracted from an upload.
    Extracted,
    /// Summary available.
    Summarized,
    /// Translation (or translation error) available.
    Translated,
    /// Audio generated for the translation.
    AudioReady,
}

/// Latest translation of the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Language selected when translating.
    pub language: Language,
    /// Translated text, or the displayed error message.
    pub text: String,
    /// Whether `text` is an error message.
    pub failed: bool,
}

/// Mutable state of one session.
#[derive(Debug)]
pub struct SessionState {
    id: Uuid,
    created_at: OffsetDateTime,
    extracted_text: String,
    page_count: usize,
    summary: String,
    translation: Option<Translation>,
    audio: Option<PathBuf>,
}

impl SessionState {
    /// Fresh, idle session state.
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            created_at: OffsetDateTime::now_utc(),
            extracted_text: String::new(),
            page_count: 0,
            summary: String::new(),
            translation: None,
            audio: None,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Text of the latest upload.
    pub fn extracted_text(&self) -> &str {
        &self.extracted_text
    }

    /// Latest formatted summary.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Latest translation.
    pub fn translation(&self) -> Option<&Translation> {
        self.translation.as_ref()
    }

    /// Path of the latest generated audio.
    pub fn audio(&self) -> Option<&Path> {
        self.audio.as_deref()
    }

    /// Furthest stage reached.
    pub fn stage(&self) -> SessionStage {
        if self.audio.is_some() {
            SessionStage::AudioReady
        } else if self.translation.is_some() {
            SessionStage::Translated
        } else if !self.summary.is_empty() {
            SessionStage::Summarized
        } else if self.page_count > 0 || !self.extracted_text.is_empty() {
            SessionStage::Extracted
        } else {
            SessionStage::Idle
        }
    }

    /// Input for summarization: the extracted text, refused when blank.
    pub fn summary_input(&self) -> Result<&str, SessionError> {
        if self.extracted_text.trim().is_empty() {
            return Err(SessionError::NoExtractedText);
        }
        Ok(&self.extracted_text)
    }

    /// Input for translation: the current summary.
    pub fn translation_input(&self) -> Result<&str, SessionError> {
        if self.summary.trim().is_empty() {
            return Err(SessionError::NoSummary);
        }
        Ok(&self.summary)
    }

    /// Input for speech: the translated text and the language it was requested in.
    pub fn speech_input(&self) -> Result<(&str, Language), SessionError> {
        match &self.translation {
            Some(translation) if !translation.text.trim().is_empty() => {
                Ok((&translation.text, translation.language))
            }
            _ => Err(SessionError::NoTranslation),
        }
    }

    /// Replace the document text; drops every derived result.
    ///
    /// Returns the audio file that is no longer referenced, if any.
    pub fn record_extraction(&mut self, document: ExtractedDocument) -> Option<PathBuf> {
        self.extracted_text = document.text;
        self.page_count = document.page_count;
        self.summary.clear();
        self.translation = None;
        self.audio.take()
    }

    /// Replace the summary; drops the translation and audio derived from the old one.
    pub fn record_summary(&mut self, summary: String) -> Option<PathBuf> {
        self.summary = summary;
        self.translation = None;
        self.audio.take()
    }

    /// Replace the translation with translated text.
    pub fn record_translation(&mut self, language: Language, text: String) -> Option<PathBuf> {
        self.translation = Some(Translation {
            language,
            text,
            failed: false,
        });
        self.audio.take()
    }

    /// Replace the translation with a displayed error message.
    pub fn record_translation_failure(
        &mut self,
        language: Language,
        error: &impl std::fmt::Display,
    ) -> Option<PathBuf> {
        self.translation = Some(Translation {
            language,
            text: format!("{TRANSLATION_ERROR_PREFIX}{error}"),
            failed: true,
        });
        self.audio.take()
    }

    /// Replace the audio artifact; returns the file it displaced.
    pub fn record_audio(&mut self, path: PathBuf) -> Option<PathBuf> {
        self.audio.replace(path)
    }

    /// Give up the audio artifact, leaving the texts in place.
    pub fn release_audio(&mut self) -> Option<PathBuf> {
        self.audio.take()
    }

    /// Serializable view for the page.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id.to_string(),
            created_at: self.created_at.format(&Rfc3339).unwrap_or_default(),
            stage: self.stage(),
            page_count: self.page_count,
            extracted_text: self.extracted_text.clone(),
            summary: self.summary.clone(),
            language: self.translation.as_ref().map(|t| t.language.name()),
            translated_text: self.translation.as_ref().map(|t| t.text.clone()),
            translation_failed: self.translation.as_ref().is_some_and(|t| t.failed),
            audio_available: self.audio.is_some(),
        }
    }
}

/// Serializable copy of a session's state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub session_id: String,
    /// Creation time, RFC 3339.
    pub created_at: String,
    /// Furthest stage reached.
    pub stage: SessionStage,
    /// Pages in the latest upload.
    pub page_count: usize,
    /// Extracted text.
    pub extracted_text: String,
    /// Formatted summary.
    pub summary: String,
    /// Language of the latest translation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<&'static str>,
    /// Latest translation or translation error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    /// Whether `translated_text` is an error message.
    pub translation_failed: bool,
    /// Whether audio can be fetched.
    pub audio_available: bool,
}

/// Shared handle on one session.
pub type SessionHandle = Arc<Mutex<SessionState>>;

struct SessionEntry {
    handle: SessionHandle,
    last_seen: Instant,
}

/// All live sessions of the process.
///
/// A session ends when the page deletes it or when it has not been looked up for the idle
/// timeout. Ended sessions are handed back so the caller can release their audio.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
    idle_timeout: Duration,
}

impl SessionStore {
    /// Empty store expiring sessions left idle for `idle_timeout`.
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Open a new idle session.
    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        let entry = SessionEntry {
            handle: Arc::new(Mutex::new(SessionState::new(id))),
            last_seen: Instant::now(),
        };
        self.sessions.write().await.insert(id, entry);
        tracing::debug!(session = %id, "Session created");
        id
    }

    /// Look up a session, marking it as used.
    pub async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_seen = Instant::now();
        Some(Arc::clone(&entry.handle))
    }

    /// End a session, returning its state.
    pub async fn remove(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|entry| entry.handle)
    }

    /// End every session idle for at least the timeout.
    ///
    /// Sessions still held by a request are kept however long they have been idle.
    pub async fn remove_idle(&self) -> Vec<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, entry)| {
                entry.last_seen.elapsed() >= self.idle_timeout
                    && Arc::strong_count(&entry.handle) == 1
            })
            .map(|(id, _)| *id)
            .collect();
        expired
            .iter()
            .filter_map(|id| sessions.remove(id))
            .map(|entry| entry.handle)
            .collect()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(text: &str) -> ExtractedDocument {
        ExtractedDocument {
            text: text.into(),
            page_count: 1,
        }
    }

    #[test]
    fn new_session_is_idle_and_refuses_every_stage() {
        let state = SessionState::new(Uuid::new_v4());
        assert_eq!(state.stage(), SessionStage::Idle);
        assert_eq!(state.summary_input(), Err(SessionError::NoExtractedText));
        assert_eq!(state.translation_input(), Err(SessionError::NoSummary));
        assert_eq!(state.speech_input(), Err(SessionError::NoTranslation));
    }

    #[test]
    fn blank_extraction_cannot_be_summarized() {
        let mut state = SessionState::new(Uuid::new_v4());
        state.record_extraction(document("  \n"));
        assert_eq!(state.stage(), SessionStage::Extracted);
        assert_eq!(state.summary_input(), Err(SessionError::NoExtractedText));
    }

    #[test]
    fn stages_advance_in_order() {
        let mut state = SessionState::new(Uuid::new_v4());
        state.record_extraction(document("Hello world."));
        assert_eq!(state.summary_input(), Ok("Hello world."));

        state.record_summary("\n\nHello world..".into());
        assert_eq!(state.stage(), SessionStage::Summarized);

        state.record_translation(Language::Hindi, "नमस्ते दुनिया।".into());
        assert_eq!(state.stage(), SessionStage::Translated);
        assert_eq!(state.speech_input(), Ok(("नमस्ते दुनिया।", Language::Hindi)));

        assert!(state.record_audio(PathBuf::from("audio/a.mp3")).is_none());
        assert_eq!(state.stage(), SessionStage::AudioReady);
    }

    #[test]
    fn new_upload_clears_derived_results_and_returns_old_audio() {
        let mut state = SessionState::new(Uuid::new_v4());
        state.record_extraction(document("First."));
        state.record_summary("summary".into());
        state.record_translation(Language::Tamil, "translated".into());
        state.record_audio(PathBuf::from("audio/old.mp3"));

        let displaced = state.record_extraction(document("Second."));
        assert_eq!(displaced, Some(PathBuf::from("audio/old.mp3")));
        assert_eq!(state.extracted_text(), "Second.");
        assert!(state.summary().is_empty());
        assert!(state.translation().is_none());
        assert!(state.audio().is_none());
    }

    #[test]
    fn resummarizing_replaces_summary_and_drops_translation() {
        let mut state = SessionState::new(Uuid::new_v4());
        state.record_extraction(document("Text."));
        state.record_summary("one".into());
        state.record_translation(Language::Kannada, "ಒಂದು".into());

        state.record_summary("two".into());
        assert_eq!(state.summary(), "two");
        assert!(state.translation().is_none());
    }

    #[test]
    fn translation_failure_is_displayed_as_text() {
        let mut state = SessionState::new(Uuid::new_v4());
        state.record_extraction(document("Text."));
        state.record_summary("summary".into());
        state.record_translation_failure(Language::Hindi, &"service unavailable");

        let translation = state.translation().expect("translation");
        assert!(translation.failed);
        assert_eq!(translation.text, "Translation error: service unavailable");
        // The error text is still voiced, in the selected language.
        assert_eq!(
            state.speech_input(),
            Ok(("Translation error: service unavailable", Language::Hindi))
        );
    }

    #[test]
    fn replacing_audio_returns_previous_file() {
        let mut state = SessionState::new(Uuid::new_v4());
        state.record_audio(PathBuf::from("a.mp3"));
        assert_eq!(
            state.record_audio(PathBuf::from("b.mp3")),
            Some(PathBuf::from("a.mp3"))
        );
    }

    #[test]
    fn snapshot_reports_translation_fields() {
        let mut state = SessionState::new(Uuid::new_v4());
        state.record_extraction(document("Text."));
        state.record_summary("summary".into());
        state.record_translation(Language::Malayalam, "സംഗ്രഹം".into());

        let snapshot = state.snapshot();
        assert_eq!(snapshot.stage, SessionStage::Translated);
        assert_eq!(snapshot.language, Some("Malayalam"));
        assert_eq!(snapshot.translated_text.as_deref(), Some("സംഗ്രഹം"));
        assert!(!snapshot.translation_failed);
        assert!(!snapshot.audio_available);
        assert!(!snapshot.created_at.is_empty());
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn store_creates_independent_sessions() {
        let store = SessionStore::new(HOUR);
        assert!(store.is_empty().await);
        let first = store.create().await;
        let second = store.create().await;
        assert_ne!(first, second);
        assert_eq!(store.len().await, 2);

        let handle = store.get(first).await.expect("first session");
        handle
            .lock()
            .await
            .record_extraction(document("Only first."));
        let other = store.get(second).await.expect("second session");
        assert!(other.lock().await.extracted_text().is_empty());
        assert!(store.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn removed_session_is_no_longer_found() {
        let store = SessionStore::new(HOUR);
        let id = store.create().await;

        let removed = store.remove(id).await.expect("removed session");
        assert_eq!(removed.lock().await.id(), id);
        assert!(store.get(id).await.is_none());
        assert!(store.remove(id).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn idle_sessions_are_removed() {
        let store = SessionStore::new(Duration::ZERO);
        let id = store.create().await;

        let expired = store.remove_idle().await;
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].lock().await.id(), id);
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test]
    async fn sessions_in_use_or_recently_seen_are_kept() {
        let idle = SessionStore::new(Duration::ZERO);
        let id = idle.create().await;
        let in_use = idle.get(id).await.expect("session");
        assert!(idle.remove_idle().await.is_empty());
        drop(in_use);
        assert_eq!(idle.remove_idle().await.len(), 1);

        let fresh = SessionStore::new(HOUR);
        fresh.create().await;
        assert!(fresh.remove_idle().await.is_empty());
        assert_eq!(fresh.len().await, 1);
    }

    #[test]
    fn releasing_audio_keeps_texts() {
        let mut state = SessionState::new(Uuid::new_v4());
        state.record_extraction(document("Text."));
        state.record_audio(PathBuf::from("audio/a.mp3"));

        assert_eq!(state.release_audio(), Some(PathBuf::from("audio/a.mp3")));
        assert!(state.audio().is_none());
        assert_eq!(state.extracted_text(), "Text.");
    }
}
