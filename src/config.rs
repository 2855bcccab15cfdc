use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Default inference endpoint for the legal LED summarization model.
pub const DEFAULT_SUMMARIZER_URL: &str =
    "https://api-inference.huggingface.co/models/nsi319/legal-led-base-16384";
/// Model identifier of the pretrained summarizer.
pub const DEFAULT_SUMMARIZER_MODEL: &str = "nsi319/legal-led-base-16384";
/// Base URL of the public translation endpoint.
pub const DEFAULT_TRANSLATE_URL: &str = "https://translate.googleapis.com";
/// Base URL of the public speech synthesis endpoint.
pub const DEFAULT_TTS_URL: &str = "https://translate.google.com";
const DEFAULT_AUDIO_DIR: &str = "audio";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;
const DEFAULT_SESSION_IDLE_SECS: u64 = 60 * 60;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the BrevityLaw server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Generation endpoint serving the summarization model.
    pub summarizer_url: String,
    /// Identifier of the summarization model.
    pub summarizer_model: String,
    /// Optional path to the model's `tokenizer.json`.
    pub summarizer_tokenizer_path: Option<PathBuf>,
    /// Optional bearer token sent to the inference endpoint.
    pub hf_api_token: Option<String>,
    /// Base URL of the translation service.
    pub translate_url: String,
    /// Base URL of the speech synthesis service.
    pub tts_url: String,
    /// Directory receiving generated audio files.
    pub audio_dir: PathBuf,
    /// Maximum accepted size of an uploaded document, in bytes.
    pub max_upload_bytes: usize,
    /// Seconds without a request after which a session is discarded.
    pub session_idle_secs: u64,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            summarizer_url: load_env_or("SUMMARIZER_URL", DEFAULT_SUMMARIZER_URL),
            summarizer_model: load_env_or("SUMMARIZER_MODEL", DEFAULT_SUMMARIZER_MODEL),
            summarizer_tokenizer_path: load_env_optional("SUMMARIZER_TOKENIZER_PATH")
                .map(PathBuf::from),
            hf_api_token: load_env_optional("HF_API_TOKEN"),
            translate_url: load_env_or("TRANSLATE_URL", DEFAULT_TRANSLATE_URL),
            tts_url: load_env_or("TTS_URL", DEFAULT_TTS_URL),
            audio_dir: PathBuf::from(load_env_or("AUDIO_DIR", DEFAULT_AUDIO_DIR)),
            max_upload_bytes: load_env_optional("MAX_UPLOAD_BYTES")
                .map(|value| {
                    value
                        .parse::<usize>()
                        .ok()
                        .filter(|limit| *limit > 0)
                        .ok_or_else(|| ConfigError::InvalidValue("MAX_UPLOAD_BYTES".into()))
                })
                .transpose()?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            session_idle_secs: load_positive("SESSION_IDLE_SECS")?
                .unwrap_or(DEFAULT_SESSION_IDLE_SECS),
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_positive(key: &str) -> Result<Option<u64>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|number| *number > 0)
                .ok_or_else(|| ConfigError::InvalidValue(key.into()))
        })
        .transpose()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        server_port = ?config.server_port,
        summarizer_url = %config.summarizer_url,
        summarizer_model = %config.summarizer_model,
        tokenizer = ?config.summarizer_tokenizer_path,
        translate_url = %config.translate_url,
        tts_url = %config.tts_url,
        audio_dir = %config.audio_dir.display(),
        session_idle_secs = config.session_idle_secs,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
