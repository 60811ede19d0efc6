// src/models/pattern.rs

//! Exclusion pattern value type.
//!
//! A pattern is the ascending set of transformed-line indices that vary
//! incidentally on a page. It is persisted inside each `SiteChange` as a
//! comma-separated list (`"0,4,17"`); the empty string means "no exclusions".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building, parsing or applying a pattern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// The two documents do not share a line layout
    #[error("line count mismatch: {left} vs {right}")]
    ShapeMismatch { left: usize, right: usize },

    /// A stored index does not exist in the document
    #[error("index {index} out of range for {len} lines")]
    OutOfRange { index: usize, len: usize },

    /// The persisted form is not a list of non-negative integers
    #[error("invalid pattern '{0}'")]
    Parse(String),
}

/// Ascending, duplicate-free list of line indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pattern(Vec<usize>);

impl Pattern {
    /// A pattern that excludes nothing.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a pattern from arbitrary indices, sorting and deduplicating them.
    pub fn from_indices(mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Largest excluded index, if any.
    pub fn max_index(&self) -> Option<usize> {
        self.0.last().copied()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for index in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{index}")?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::empty());
        }

        let mut indices = Vec::new();
        for part in trimmed.split(',') {
            let index = part
                .trim()
                .parse::<usize>()
                .map_err(|_| PatternError::Parse(s.to_string()))?;
            indices.push(index);
        }

        // Persisted patterns are written ascending; anything else is corrupt.
        if indices.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PatternError::Parse(s.to_string()));
        }

        Ok(Self(indices))
    }
}

impl TryFrom<String> for Pattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.to_string()
    }
}
