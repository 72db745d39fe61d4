//! Exact and All-Words matchers over the metadata table.

use std::collections::HashSet;

use corpus_core::{Candidate, Filters, MatchCategory};
use tracing::{debug, info};

use crate::metadata::MetadataTable;
use crate::query::PreparedQuery;
use crate::snippet::SnippetExtractor;

pub const EXACT_DISTANCE: f32 = 0.0;
/// Placeholder distance of all-words hits not confirmed by the vector index.
pub const ALL_WORDS_DISTANCE: f32 = 0.1;

/// Per-request state shared by every matcher: the corpus, the prepared query,
/// facet filters and snippet policy.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub table: &'a MetadataTable,
    pub query: &'a PreparedQuery,
    pub filters: &'a Filters,
    pub min_snippet_length: usize,
    pub snippets: SnippetExtractor,
}

impl<'a> MatchContext<'a> {
    /// Turn the chunk at `index` into a candidate, or `None` when the index is
    /// unknown, the chunk fails the filters, or its snippet is too short.
    pub fn candidate(&self, index: usize, category: MatchCategory, distance: f32) -> Option<Candidate> {
        let chunk = self.table.get(index)?;
        if !self.filters.passes(chunk) {
            debug!(index, "filtered out");
            return None;
        }
        let snippet = self.snippets.extract(&chunk.snippet, self.query);
        if snippet.char_len() < self.min_snippet_length {
            debug!(index, len = snippet.char_len(), min = self.min_snippet_length, "snippet too short");
            return None;
        }
        Some(Candidate::new(chunk, category, distance, snippet.text))
    }

    /// Chunks whose folded text contains the folded query literally.
    pub fn exact_matches(&self, exclude: &HashSet<usize>) -> Vec<Candidate> {
        let needle = self.query.normalized();
        let matches: Vec<Candidate> = self
            .table
            .iter()
            .filter(|(chunk, _)| !exclude.contains(&chunk.index))
            .filter(|(_, text)| text.contains(needle))
            .filter_map(|(chunk, _)| self.candidate(chunk.index, MatchCategory::Exact, EXACT_DISTANCE))
            .collect();
        info!(query = self.query.raw(), count = matches.len(), "exact matches");
        matches
    }

    /// Chunks whose folded word set contains every query word.
    pub fn all_words_matches(&self, exclude: &HashSet<usize>) -> Vec<Candidate> {
        let matches: Vec<Candidate> = self
            .table
            .iter()
            .filter(|(chunk, _)| !exclude.contains(&chunk.index))
            .filter(|(_, text)| contains_all_words(text, self.query.words()))
            .filter_map(|(chunk, _)| self.candidate(chunk.index, MatchCategory::AllWords, ALL_WORDS_DISTANCE))
            .collect();
        info!(query = self.query.raw(), count = matches.len(), "all-words matches");
        matches
    }
}

/// True iff every word of `words` occurs as a whole space-separated word of
/// the folded `text`.
pub fn contains_all_words(text: &str, words: &[String]) -> bool {
    let set: HashSet<&str> = text.split(' ').collect();
    words.iter().all(|w| set.contains(w.as_str()))
}
