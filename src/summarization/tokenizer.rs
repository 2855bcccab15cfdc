//! Process-wide handle on the summarization model's tokenizer.
//!
//! The handle is loaded once, before the server accepts requests, and shared read-only by every
//! session. When `SUMMARIZER_TOKENIZER_PATH` points at the model's `tokenizer.json` the Hugging
//! Face tokenizer is used; otherwise token budgets are measured with the GPT-2 byte-level BPE
//! (`r50k_base`) that LED/BART vocabularies derive from.

use anyhow::Error as BpeError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tiktoken_rs::{CoreBPE, r50k_base};
use tokenizers::Tokenizer;
use tokio::sync::OnceCell;

/// Special tokens (`<s>`, `</s>`) the model adds around every encoded input.
const SPECIAL_TOKENS_PER_INPUT: usize = 2;

static MODEL: OnceCell<Arc<SummarizerModel>> = OnceCell::const_new();

/// Errors raised while loading or applying the tokenizer.
#[derive(Debug, Error)]
pub enum TokenizerError {
    /// `tokenizer.json` could not be read or parsed.
    #[error("failed to load tokenizer from {path}: {message}")]
    Load {
        /// File we attempted to load.
        path: PathBuf,
        /// Diagnostic from the tokenizers library.
        message: String,
    },
    /// The built-in BPE ranks could not be initialized.
    #[error("failed to initialize BPE encoding: {0}")]
    Bpe(#[source] BpeError),
    /// Encoding the input text failed.
    #[error("failed to encode text: {0}")]
    Encode(String),
    /// The loader task panicked or was cancelled.
    #[error("tokenizer loader task failed: {0}")]
    Task(String),
}

enum Backend {
    HuggingFace(Box<Tokenizer>),
    Bpe(CoreBPE),
}

/// Immutable tokenizer handle for the configured summarization model.
pub struct SummarizerModel {
    model_id: String,
    backend: Backend,
}

impl std::fmt::Debug for SummarizerModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummarizerModel")
            .field("model_id", &self.model_id)
            .field("backend", &self.backend_name())
            .finish()
    }
}

impl SummarizerModel {
    /// Load the tokenizer from `tokenizer_path`, or fall back to the built-in BPE.
    pub fn load(model_id: &str, tokenizer_path: Option<&Path>) -> Result<Self, TokenizerError> {
        let backend = match tokenizer_path {
            Some(path) => {
                let tokenizer =
                    Tokenizer::from_file(path).map_err(|error| TokenizerError::Load {
                        path: path.to_path_buf(),
                        message: error.to_string(),
                    })?;
                Backend::HuggingFace(Box::new(tokenizer))
            }
            None => {
                tracing::warn!(
                    model = model_id,
                    "No tokenizer file configured; measuring input with r50k_base"
                );
                Backend::Bpe(r50k_base().map_err(TokenizerError::Bpe)?)
            }
        };
        Ok(Self {
            model_id: model_id.to_string(),
            backend,
        })
    }

    /// Identifier of the model this tokenizer belongs to.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::HuggingFace(_) => "tokenizers",
            Backend::Bpe(_) => "r50k_base",
        }
    }

    /// Number of content tokens in `text`, excluding special tokens.
    pub fn count_tokens(&self, text: &str) -> Result<usize, TokenizerError> {
        match &self.backend {
            Backend::HuggingFace(tokenizer) => tokenizer
                .encode(text, false)
                .map(|encoding| encoding.len())
                .map_err(|error| TokenizerError::Encode(error.to_string())),
            Backend::Bpe(bpe) => Ok(bpe.encode_ordinary(text).len()),
        }
    }

    /// Cut `text` so that, once the model adds its special tokens, it fits `max_tokens`.
    ///
    /// Text within the budget is returned unchanged; longer text keeps its leading tokens.
    pub fn truncate_to_budget(
        &self,
        text: &str,
        max_tokens: usize,
    ) -> Result<String, TokenizerError> {
        let budget = max_tokens.saturating_sub(SPECIAL_TOKENS_PER_INPUT);
        match &self.backend {
            Backend::HuggingFace(tokenizer) => {
                let encoding = tokenizer
                    .encode(text, false)
                    .map_err(|error| TokenizerError::Encode(error.to_string()))?;
                let offsets = encoding.get_offsets();
                if offsets.len() <= budget {
                    return Ok(text.to_string());
                }
                let end = budget
                    .checked_sub(1)
                    .map(|last| offsets[last].1)
                    .unwrap_or(0);
                Ok(prefix_at_char_boundary(text, end).to_string())
            }
            Backend::Bpe(bpe) => {
                let tokens = bpe.encode_ordinary(text);
                if tokens.len() <= budget {
                    return Ok(text.to_string());
                }
                // A cut can land inside a multi-byte character; back off until it decodes.
                let mut keep = budget;
                loop {
                    match bpe.decode(tokens[..keep].to_vec()) {
                        Ok(prefix) => return Ok(prefix),
                        Err(_) if keep > 0 => keep -= 1,
                        Err(error) => return Err(TokenizerError::Encode(error.to_string())),
                    }
                }
            }
        }
    }
}

fn prefix_at_char_boundary(text: &str, mut end: usize) -> &str {
    end = end.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Load the process-wide tokenizer handle exactly once.
///
/// Concurrent callers wait on the same initialization; later calls return the cached handle.
pub async fn load_model(
    model_id: &str,
    tokenizer_path: Option<&Path>,
) -> Result<Arc<SummarizerModel>, TokenizerError> {
    let model_id = model_id.to_string();
    let tokenizer_path = tokenizer_path.map(Path::to_path_buf);
    MODEL
        .get_or_try_init(|| async move {
            let model = tokio::task::spawn_blocking(move || {
                SummarizerModel::load(&model_id, tokenizer_path.as_deref())
            })
            .await
            .map_err(|error| TokenizerError::Task(error.to_string()))??;
            tracing::info!(
                model = model.model_id(),
                backend = model.backend_name(),
                "Summarization tokenizer loaded"
            );
            Ok(Arc::new(model))
        })
        .await
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bpe_model() -> SummarizerModel {
        SummarizerModel::load("test-model", None).expect("bpe tokenizer")
    }

    #[test]
    fn short_text_is_not_truncated() {
        let model = bpe_model();
        let text = "The lessee shall keep the premises in good repair.";
        assert_eq!(model.truncate_to_budget(text, 6144).unwrap(), text);
    }

    #[test]
    fn long_text_is_cut_to_budget_minus_special_tokens() {
        let model = bpe_model();
        let text = "clause ".repeat(200);
        let truncated = model.truncate_to_budget(&text, 50).unwrap();
        assert!(text.starts_with(&truncated));
        assert_eq!(model.count_tokens(&truncated).unwrap(), 48);
    }

    #[test]
    fn truncation_never_splits_characters() {
        let model = bpe_model();
        let text = "अनुबंध की शर्तें ".repeat(100);
        let truncated = model.truncate_to_budget(&text, 40).unwrap();
        assert!(!truncated.is_empty());
        assert!(text.starts_with(&truncated));
        assert!(truncated.len() < text.len());
    }

    #[test]
    fn missing_tokenizer_file_is_reported() {
        let error = SummarizerModel::load("test-model", Some(Path::new("/nonexistent/tok.json")))
            .unwrap_err();
        assert!(matches!(error, TokenizerError::Load { .. }));
    }

    #[test]
    fn prefix_backs_off_to_char_boundary() {
        assert_eq!(prefix_at_char_boundary("añb", 2), "a");
        assert_eq!(prefix_at_char_boundary("abc", 10), "abc");
    }

    #[tokio::test]
    async fn model_is_loaded_once() {
        let first = load_model("test-model", None).await.expect("load");
        let second = load_model("other-model", None).await.expect("load");
        assert!(Arc::ptr_eq(&first, &second));
    }
}
