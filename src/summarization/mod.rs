//! Abstractive summaries from the pretrained legal LED model.
//!
//! The model itself runs behind a hosted inference endpoint; this module owns the fixed
//! generation parameters, the request/response mapping, and the display formatting of the result.
//! Input truncation happens before the request, using the tokenizer handle in [`tokenizer`].

pub mod format;
pub mod tokenizer;

use crate::config::get_config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

pub use format::format_summary;
pub use tokenizer::{SummarizerModel, TokenizerError, load_model};

/// Maximum number of input tokens the model is given, special tokens included.
pub const MAX_INPUT_TOKENS: usize = 6144;

/// Errors surfaced while generating a summary.
#[derive(Debug, Error)]
pub enum SummarizationClientError {
    /// Endpoint could not be reached.
    #[error("Summarization provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Endpoint returned an error response.
    #[error("Failed to generate summary: {0}")]
    GenerationFailed(String),
    /// Endpoint response could not be parsed or held no text.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Beam-search settings sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Number of beams kept during search.
    pub num_beams: u32,
    /// Size of n-grams that may not repeat in the output.
    pub no_repeat_ngram_size: u32,
    /// Exponential length penalty; values above 1 favour longer outputs.
    pub length_penalty: f32,
    /// Minimum output length in tokens.
    pub min_length: usize,
    /// Maximum output length in tokens.
    pub max_length: usize,
}

impl GenerationParams {
    /// Parameters tuned for the legal LED checkpoint.
    pub const LEGAL_SUMMARY: Self = Self {
        num_beams: 4,
        no_repeat_ngram_size: 3,
        length_penalty: 2.0,
        min_length: 350,
        max_length: 500,
    };

    /// Whether a generated token count lies inside `[min_length, max_length]`.
    pub fn accepts_length(&self, tokens: usize) -> bool {
        (self.min_length..=self.max_length).contains(&tokens)
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::LEGAL_SUMMARY
    }
}

/// Request passed to the summarization provider.
#[derive(Debug, Clone)]
pub struct SummarizationRequest {
    /// Document text, already truncated to the model's input budget.
    pub text: String,
    /// Beam-search settings.
    pub params: GenerationParams,
}

/// Interface implemented by summarization backends.
#[async_trait]
pub trait SummarizationClient: Send + Sync {
    /// Generate an unformatted summary of the request text.
    async fn generate_summary(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError>;
}

/// Build the summarization client described by the configuration.
pub fn get_summarization_client() -> Result<Box<dyn SummarizationClient>, SummarizationClientError>
{
    let config = get_config();
    let client = InferenceSummarizationClient::new(
        config.summarizer_url.clone(),
        config.hf_api_token.clone(),
    )?;
    Ok(Box::new(client))
}

const USER_AGENT: &str = "brevitylaw/summary";

/// Client for Hugging Face style text-to-text inference endpoints.
pub struct InferenceSummarizationClient {
    http: Client,
    endpoint: String,
    api_token: Option<String>,
}

impl InferenceSummarizationClient {
    /// Create a client posting to `endpoint`, authenticating with `api_token` when present.
    pub fn new(
        endpoint: String,
        api_token: Option<String>,
    ) -> Result<Self, SummarizationClientError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            http,
            endpoint,
            api_token,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenerationOutput {
    #[serde(alias = "generated_text")]
    summary_text: String,
}

#[async_trait]
impl SummarizationClient for InferenceSummarizationClient {
    async fn generate_summary(
        &self,
        request: SummarizationRequest,
    ) -> Result<String, SummarizationClientError> {
        let params = request.params;
        let payload = json!({
            "inputs": request.text,
            "parameters": {
                "num_beams": params.num_beams,
                "no_repeat_ngram_size": params.no_repeat_ngram_size,
                "length_penalty": params.length_penalty,
                "min_length": params.min_length,
                "max_length": params.max_length,
                "do_sample": false,
            },
            "options": {
                "wait_for_model": true,
            }
        });

        let mut builder = self.http.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|error| {
            SummarizationClientError::ProviderUnavailable(format!(
                "failed to reach {}: {error}",
                self.endpoint
            ))
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SummarizationClientError::ProviderUnavailable(format!(
                "endpoint {} returned 404",
                self.endpoint
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizationClientError::GenerationFailed(format!(
                "endpoint returned {status}: {body}"
            )));
        }

        let outputs: Vec<GenerationOutput> = response.json().await.map_err(|error| {
            SummarizationClientError::InvalidResponse(format!(
                "failed to decode generation response: {error}"
            ))
        })?;

        let summary = outputs
            .into_iter()
            .next()
            .map(|output| output.summary_text.trim().to_string())
            .unwrap_or_default();
        if summary.is_empty() {
            return Err(SummarizationClientError::InvalidResponse(
                "generation returned no text".into(),
            ));
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn client_for(server: &MockServer) -> InferenceSummarizationClient {
        InferenceSummarizationClient::new(server.url("/generate"), None).expect("client")
    }

    fn request(text: &str) -> SummarizationRequest {
        SummarizationRequest {
            text: text.into(),
            params: GenerationParams::default(),
        }
    }

    #[tokio::test]
    async fn sends_fixed_generation_parameters() {
        let server = MockServer::start_async().await;
        let client =
            InferenceSummarizationClient::new(server.url("/models/led"), None).expect("client");

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/models/led")
                    .json_body_partial(
                        r#"{"parameters": {"num_beams": 4, "no_repeat_ngram_size": 3,
                            "length_penalty": 2.0, "min_length": 350, "max_length": 500}}"#,
                    );
                then.status(200)
                    .json_body(json!([{ "summary_text": " The parties agree. " }]));
            })
            .await;

        let summary = client
            .generate_summary(request("Agreement text"))
            .await
            .expect("summary");

        mock.assert_async().await;
        assert_eq!(summary, "The parties agree.");
    }

    #[tokio::test]
    async fn accepts_generated_text_field_and_bearer_token() {
        let server = MockServer::start_async().await;
        let token = Some("secret".to_string());
        let client =
            InferenceSummarizationClient::new(server.url("/generate"), token).expect("client");

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/generate")
                    .header("authorization", "Bearer secret");
                then.status(200)
                    .json_body(json!([{ "generated_text": "Summary." }]));
            })
            .await;

        let summary = client
            .generate_summary(request("text"))
            .await
            .expect("summary");
        mock.assert_async().await;
        assert_eq!(summary, "Summary.");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start_async().await;
        let client = client_for(&server);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/generate");
                then.status(503).body("model loading");
            })
            .await;

        let error = client
            .generate_summary(request("text"))
            .await
            .expect_err("error response");
        assert!(matches!(
            error,
            SummarizationClientError::GenerationFailed(ref message) if message.contains("503")
        ));
    }

    #[tokio::test]
    async fn empty_generation_is_rejected() {
        let server = MockServer::start_async().await;
        let client = client_for(&server);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/generate");
                then.status(200).json_body(json!([]));
            })
            .await;

        let error = client
            .generate_summary(request("text"))
            .await
            .expect_err("empty response");
        assert!(matches!(
            error,
            SummarizationClientError::InvalidResponse(_)
        ));
    }

    #[tokio::test]
    async fn requests_carry_the_service_user_agent() {
        let server = MockServer::start_async().await;
        let client = client_for(&server);

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/generate")
                    .header("user-agent", USER_AGENT);
                then.status(200)
                    .json_body(json!([{ "summary_text": "Summary." }]));
            })
            .await;

        client
            .generate_summary(request("text"))
            .await
            .expect("summary");
        mock.assert_async().await;
    }

    #[test]
    fn length_bounds_are_inclusive() {
        let params = GenerationParams::LEGAL_SUMMARY;
        assert!(params.accepts_length(350));
        assert!(params.accepts_length(500));
        assert!(!params.accepts_length(349));
        assert!(!params.accepts_length(501));
    }
}
