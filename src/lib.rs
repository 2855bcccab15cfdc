#![deny(missing_docs)]

//! Core library for the BrevityLaw legal document assistant.

/// HTTP routing, handlers, and the single-page UI.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// PDF text extraction.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline activity counters.
pub mod metrics;
/// Stage coordination across the external services.
pub mod pipeline;
/// Per-session pipeline state.
pub mod session;
/// Speech synthesis and audio storage.
pub mod speech;
/// Model-backed summarization.
pub mod summarization;
/// Summary translation.
pub mod translation;
