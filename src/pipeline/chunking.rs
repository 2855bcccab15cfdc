//! Character-budget segmentation for the remote translation and speech services.
//!
//! Both services cap the size of a single request: translation accepts a few thousand characters,
//! speech synthesis roughly a hundred. Text longer than the budget is first split with
//! `semchunk-rs`, which cuts at the largest separator present (line breaks, then whitespace).
//! Its merge step can overshoot the budget by one split, so any oversized piece is repacked word
//! by word; only a single word longer than the budget is ever cut inside.

use semchunk_rs::Chunker;

/// Largest text sent to the translation service in one request.
pub(crate) const TRANSLATION_SEGMENT_CHARS: usize = 4500;
/// Largest text sent to the speech service in one request.
pub(crate) const SPEECH_SEGMENT_CHARS: usize = 100;

/// Split `text` into segments of at most `max_chars` characters.
///
/// Text that already fits is returned as a single untouched segment so its line breaks survive.
/// Whitespace-only input yields no segments.
pub(crate) fn segment_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if text.trim().is_empty() {
        return Vec::new();
    }
    if char_count(text) <= max_chars {
        return vec![text.to_string()];
    }

    let chunker = Chunker::new(max_chars, Box::new(char_count));
    chunker
        .chunk(text)
        .into_iter()
        .flat_map(|segment| enforce_budget(segment, max_chars))
        .filter(|segment| !segment.trim().is_empty())
        .collect()
}

/// Repack a segment that exceeds the budget into whole-word pieces.
fn enforce_budget(segment: String, max_chars: usize) -> Vec<String> {
    if char_count(&segment) <= max_chars {
        return vec![segment];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;
    for word in segment.split_whitespace() {
        let word_chars = char_count(word);
        if word_chars > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            pieces.extend(split_word(word, max_chars));
            continue;
        }

        let needed = if current.is_empty() {
            word_chars
        } else {
            current_chars + 1 + word_chars
        };
        if needed > max_chars {
            pieces.push(std::mem::take(&mut current));
            current.push_str(word);
            current_chars = word_chars;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_chars = needed;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Cut a single over-long word at character boundaries.
fn split_word(word: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}

fn char_count(text: &str) -> usize {
    text.chars().count()
}
