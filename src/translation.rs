//! Translation of summaries into the supported Indian languages.
//!
//! The language catalog is fixed. Text is sent to the public Google Translate web endpoint
//! (`translate_a/single`, `client=gtx`); long inputs are split into segments that fit a single
//! request and the translated segments are joined with line breaks.

use crate::config::get_config;
use crate::pipeline::chunking::{TRANSLATION_SEGMENT_CHARS, segment_text};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Target languages offered by the language selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Language {
    /// Hindi (`hi`).
    Hindi,
    /// Kannada (`kn`).
    Kannada,
    /// Telugu (`te`).
    Telugu,
    /// Tamil (`ta`).
    Tamil,
    /// Malayalam (`ml`).
    Malayalam,
}

impl Language {
    /// All languages in selector order.
    pub const ALL: [Language; 5] = [
        Language::Hindi,
        Language::Kannada,
        Language::Telugu,
        Language::Tamil,
        Language::Malayalam,
    ];

    /// ISO 639-1 code understood by the translation and speech services.
    pub const fn code(self) -> &'static str {
        match self {
            Language::Hindi => "hi",
            Language::Kannada => "kn",
            Language::Telugu => "te",
            Language::Tamil => "ta",
            Language::Malayalam => "ml",
        }
    }

    /// English display name shown in the selector.
    pub const fn name(self) -> &'static str {
        match self {
            Language::Hindi => "Hindi",
            Language::Kannada => "Kannada",
            Language::Telugu => "Telugu",
            Language::Tamil => "Tamil",
            Language::Malayalam => "Malayalam",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raised when a selector value names no supported language.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unsupported language: {0}")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    /// Accepts either the display name or the code, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Language::ALL
            .into_iter()
            .find(|language| {
                language.name().eq_ignore_ascii_case(needle)
                    || language.code().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| UnknownLanguage(s.to_string()))
    }
}

/// Errors raised by translation providers.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// The service could not be reached.
    #[error("translation service unavailable: {0}")]
    Unavailable(String),
    /// The service answered with an error status.
    #[error("translation service returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
    /// The response did not have the expected shape.
    #[error("malformed translation response: {0}")]
    InvalidResponse(String),
    /// Nothing to translate, or nothing came back.
    #[error("translation produced no text")]
    Empty,
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Interface implemented by translation backends.
#[async_trait]
pub trait TranslationClient: Send + Sync {
    /// Translate `text` into `language`.
    async fn translate(&self, text: &str, language: Language) -> Result<String, TranslationError>;
}

/// Build the translation client described by the configuration.
pub fn get_translation_client() -> Result<Box<dyn TranslationClient>, TranslationError> {
    let client = GoogleTranslateClient::new(get_config().translate_url.clone())?;
    Ok(Box::new(client))
}

const USER_AGENT: &str = "brevitylaw/translate";

/// Client for the Google Translate web endpoint.
pub struct GoogleTranslateClient {
    http: Client,
    base_url: String,
}

impl GoogleTranslateClient {
    /// Create a client for the service rooted at `base_url`.
    pub fn new(base_url: String) -> Result<Self, TranslationError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self) -> String {
        format!("{}/translate_a/single", self.base_url.trim_end_matches('/'))
    }

    async fn translate_segment(
        &self,
        segment: &str,
        language: Language,
    ) -> Result<String, TranslationError> {
        let response = self
            .http
            .post(self.endpoint())
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", language.code()),
                ("dt", "t"),
            ])
            .form(&[("q", segment)])
            .send()
            .await
            .map_err(|error| TranslationError::Unavailable(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::Status { status, body });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|error| TranslationError::InvalidResponse(error.to_string()))?;
        parse_translation(&body)
    }
}

/// Join the translated pieces of a `translate_a/single` response.
///
/// The response is a nested array whose first element lists `[translated, original, ...]`
/// pairs, one per source sentence.
fn parse_translation(body: &Value) -> Result<String, TranslationError> {
    let sentences = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslationError::InvalidResponse("missing sentence list".into()))?;

    let translated: String = sentences
        .iter()
        .filter_map(|sentence| sentence.get(0).and_then(Value::as_str))
        .collect();
    Ok(translated)
}

#[async_trait]
impl TranslationClient for GoogleTranslateClient {
    async fn translate(&self, text: &str, language: Language) -> Result<String, TranslationError> {
        let segments = segment_text(text, TRANSLATION_SEGMENT_CHARS);
        if segments.is_empty() {
            return Err(TranslationError::Empty);
        }

        let mut translated = Vec::with_capacity(segments.len());
        for segment in &segments {
            translated.push(self.translate_segment(segment, language).await?);
        }
        tracing::debug!(
            language = language.code(),
            segments = segments.len(),
            "Translated text"
        );

        let joined = translated.join("\n");
        if joined.trim().is_empty() {
            return Err(TranslationError::Empty);
        }
        Ok(joined)
    }
}
