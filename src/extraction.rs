//! PDF text extraction.
//!
//! Documents are parsed in memory with `lopdf`; the text of every page is appended in page order
//! exactly as the parser renders it. The parser ends every text object with a line break, so pages
//! stay separated by one; only the line break closing the last page is dropped. A document that
//! cannot be opened, or any page whose text cannot be read, fails the whole extraction.

use lopdf::Document;
use thiserror::Error;

/// Errors raised while turning an uploaded PDF into text.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The byte stream is not a PDF the parser can open.
    #[error("Failed to open PDF: {0}")]
    Open(String),
    /// The document opened but a page's text could not be read.
    #[error("Failed to extract text from page {page}: {message}")]
    Page {
        /// One-based page number.
        page: u32,
        /// Parser diagnostic.
        message: String,
    },
}

/// Text and page count of an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Concatenated page texts in page order.
    pub text: String,
    /// Number of pages read.
    pub page_count: usize,
}

/// Extract the text of every page of an in-memory PDF.
pub fn extract_text(bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
    let document =
        Document::load_mem(bytes).map_err(|error| ExtractionError::Open(error.to_string()))?;

    // `get_pages` is keyed by page number, so iteration follows page order.
    let pages = document.get_pages();
    let mut text = String::new();
    for page in pages.keys().copied() {
        let page_text = document
            .extract_text(&[page])
            .map_err(|error| ExtractionError::Page {
                page,
                message: error.to_string(),
            })?;
        text.push_str(&page_text);
    }
    text.truncate(text.trim_end_matches(['\n', '\r']).len());

    tracing::debug!(
        pages = pages.len(),
        chars = text.chars().count(),
        "Extracted PDF text"
    );
    Ok(ExtractedDocument {
        text,
        page_count: pages.len(),
    })
}
