//! Speech synthesis of translated text and storage of the resulting audio.
//!
//! The Google Translate TTS endpoint voices at most about a hundred characters per request, so
//! text is split into short segments and the MP3 responses are concatenated in order; MP3 frames
//! play back seamlessly when appended. Audio files are written under the configured audio
//! directory with a name unique to the session and request.

use crate::config::get_config;
use crate::pipeline::chunking::{SPEECH_SEGMENT_CHARS, segment_text};
use crate::translation::Language;
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while synthesizing or storing speech.
#[derive(Debug, Error)]
pub enum SpeechError {
    /// Nothing to voice.
    #[error("no text to synthesize")]
    EmptyText,
    /// The TTS service could not be reached.
    #[error("speech service unavailable: {0}")]
    Unavailable(String),
    /// The TTS service answered with an error status.
    #[error("speech service returned {status} for segment {segment}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Zero-based index of the failing segment.
        segment: usize,
    },
    /// The TTS service returned no audio.
    #[error("speech service returned no audio")]
    EmptyAudio,
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    /// The audio file could not be written.
    #[error("failed to write audio file {path}: {source}")]
    Write {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Interface implemented by text-to-speech backends.
#[async_trait]
pub trait SpeechClient: Send + Sync {
    /// Voice `text` in `language`, returning MP3 bytes.
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>, SpeechError>;
}

/// Build the speech client described by the configuration.
pub fn get_speech_client() -> Result<Box<dyn SpeechClient>, SpeechError> {
    let client = GoogleTtsClient::new(get_config().tts_url.clone())?;
    Ok(Box::new(client))
}

const USER_AGENT: &str = "brevitylaw/speech";

/// Client for the Google Translate TTS endpoint.
pub struct GoogleTtsClient {
    http: Client,
    base_url: String,
}

impl GoogleTtsClient {
    /// Create a client for the service rooted at `base_url`.
    pub fn new(base_url: String) -> Result<Self, SpeechError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self) -> String {
        format!("{}/translate_tts", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SpeechClient for GoogleTtsClient {
    async fn synthesize(&self, text: &str, language: Language) -> Result<Vec<u8>, SpeechError> {
        let segments = segment_text(text, SPEECH_SEGMENT_CHARS);
        if segments.is_empty() {
            return Err(SpeechError::EmptyText);
        }

        let total = segments.len().to_string();
        let mut audio = Vec::new();
        for (index, segment) in segments.iter().enumerate() {
            let idx = index.to_string();
            let textlen = segment.chars().count().to_string();
            let response = self
                .http
                .get(self.endpoint())
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", language.code()),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                    ("q", segment.as_str()),
                ])
                .send()
                .await
                .map_err(|error| SpeechError::Unavailable(error.to_string()))?;

            if !response.status().is_success() {
                return Err(SpeechError::Status {
                    status: response.status().as_u16(),
                    segment: index,
                });
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|error| SpeechError::Unavailable(error.to_string()))?;
            audio.extend_from_slice(&bytes);
        }

        if audio.is_empty() {
            return Err(SpeechError::EmptyAudio);
        }
        tracing::debug!(
            language = language.code(),
            segments = segments.len(),
            bytes = audio.len(),
            "Synthesized speech"
        );
        Ok(audio)
    }
}

/// Directory of generated audio files.
#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
}

impl AudioStore {
    /// Store files under `dir`, created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory receiving audio files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `audio` to a fresh `<session>-<request>.mp3` path and return it.
    pub async fn save(&self, session: Uuid, audio: &[u8]) -> Result<PathBuf, SpeechError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| SpeechError::Write {
                path: self.dir.clone(),
                source,
            })?;
        let path = self.dir.join(format!("{session}-{}.mp3", Uuid::new_v4()));
        tokio::fs::write(&path, audio)
            .await
            .map_err(|source| SpeechError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Delete a previously written file, logging instead of failing.
    pub async fn discard(&self, path: &Path) {
        if let Err(error) = tokio::fs::remove_file(path).await {
            tracing::debug!(path = %path.display(), error = %error, "Failed to remove old audio");
        }
    }
}
