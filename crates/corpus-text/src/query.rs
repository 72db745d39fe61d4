use corpus_core::{Error, Result};

use crate::normalize::normalize;

/// A search query in the forms the matchers need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedQuery {
    raw: String,
    normalized: String,
    words: Vec<String>,
}

impl PreparedQuery {
    /// Fails with `InvalidArgument` when nothing is left after normalization.
    pub fn new(raw: &str) -> Result<Self> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Err(Error::InvalidArgument("query is empty after normalization".to_string()));
        }
        let mut words: Vec<String> = normalized.split(' ').map(str::to_string).collect();
        words.sort();
        words.dedup();
        Ok(Self { raw: raw.to_string(), normalized, words })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Distinct normalized words, sorted.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn is_single_word(&self) -> bool {
        self.words.len() == 1 && self.words[0] == self.normalized
    }
}
