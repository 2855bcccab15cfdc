//! Document pipeline: extraction, summarization, translation, and speech, wired to sessions.

pub(crate) mod chunking;
mod service;
pub mod types;
pub mod workflow;

pub use service::{PipelineApi, PipelineService};
pub use types::{PipelineError, StageError};
