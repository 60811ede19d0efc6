// src/pipeline/fingerprint.rs

//! Fingerprint and line-exclusion primitives.
//!
//! `transform` cuts a document into pseudo-lines, one per tag or text run, by
//! starting a new line before every `<` and after every line break. Lines
//! keep their own bytes (including the `\n`), so concatenating them yields the
//! original text and `apply_pattern` with an empty pattern is exactly
//! `fingerprint`.

use sha2::{Digest, Sha224};

use crate::models::{Pattern, PatternError};

/// Hex-encoded SHA-224 digest of the UTF-8 bytes of `text`.
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha224::digest(text.as_bytes()))
}

/// Split `text` into pseudo-lines.
pub fn transform(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match c {
            '<' if i > start => {
                lines.push(&text[start..i]);
                start = i;
            }
            '\n' => {
                lines.push(&text[start..=i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }

    lines
}

/// Indices at which the transformed lines of `a` and `b` differ.
///
/// Both documents must have the same number of transformed lines.
pub fn create_pattern(a: &str, b: &str) -> Result<Pattern, PatternError> {
    let left = transform(a);
    let right = transform(b);

    if left.len() != right.len() {
        return Err(PatternError::ShapeMismatch {
            left: left.len(),
            right: right.len(),
        });
    }

    let indices = left
        .iter()
        .zip(&right)
        .enumerate()
        .filter(|(_, (l, r))| l != r)
        .map(|(i, _)| i)
        .collect();

    Ok(Pattern::from_indices(indices))
}

/// Fingerprint of `text` with the pattern's lines removed.
pub fn apply_pattern(pattern: &Pattern, text: &str) -> Result<String, PatternError> {
    let mut lines = transform(text);

    if let Some(index) = pattern.max_index() {
        if index >= lines.len() {
            return Err(PatternError::OutOfRange {
                index,
                len: lines.len(),
            });
        }
    }

    // Highest index first so each removal leaves the remaining ones valid.
    for &index in pattern.indices().iter().rev() {
        lines.remove(index);
    }

    Ok(fingerprint(&lines.concat()))
}
