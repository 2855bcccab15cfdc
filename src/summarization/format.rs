//! Layout of generated summaries for display.
//!
//! The transform is purely cosmetic: it drops characters outside a small allow-list, splits the
//! text on `". "`, opens a new paragraph for every third sentence, and renders the remaining
//! sentences as emphasized bullet lines.

/// Every `PARAGRAPH_PERIOD`-th sentence (starting with the first) opens a paragraph.
pub const PARAGRAPH_PERIOD: usize = 3;

const SENTENCE_SEPARATOR: &str = ". ";

/// Format raw model output into paragraphs and bullet lines.
pub fn format_summary(text: &str) -> String {
    let cleaned = clean_text(text);
    let mut formatted = String::with_capacity(cleaned.len() + cleaned.len() / 4);

    for (index, sentence) in cleaned.split(SENTENCE_SEPARATOR).enumerate() {
        let sentence = sentence.trim();
        if index % PARAGRAPH_PERIOD == 0 {
            formatted.push_str("\n\n");
            formatted.push_str(sentence);
            formatted.push('.');
        } else {
            formatted.push_str("\n• **");
            formatted.push_str(sentence);
            formatted.push_str("**.");
        }
    }

    formatted
}

/// Keep ASCII letters, digits, whitespace, and `.,;:!?-`.
fn clean_text(text: &str) -> String {
    text.chars()
        .filter(|c| {
            c.is_ascii_alphanumeric()
                || c.is_whitespace()
                || matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '-')
        })
        .collect()
}
