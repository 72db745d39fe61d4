//! Context-window snippet extraction.
//!
//! The chunk text is split into units (sentences or lines). Units whose folded
//! form contains the query phrase anchor a window of `context` units on each
//! side; only when no unit holds the phrase do units with any query word anchor
//! it. A window rendering shorter than
//! `min_chars` is widened once by the same amount. Without any matching unit
//! the head of the text is used instead. The rendering is highlighted on the
//! original text, line breaks become `<br/>`, markup is filtered through the
//! allow-list, and the result is cut to `max_chars`. When the cut would lose
//! the first phrase hit, leading context is dropped first.

use corpus_core::config::{ContextUnit, SnippetOptions};
use unicode_segmentation::UnicodeSegmentation;

use crate::highlight::{highlight, MARK_CLOSE, MARK_OPEN};
use crate::normalize::{normalize, FoldedText};
use crate::query::PreparedQuery;
use crate::sanitize::{sanitize, truncate_markup, LINE_BREAK};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub text: String,
    /// False when no unit matched and the head of the text was used.
    pub matched: bool,
}

impl Snippet {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SnippetExtractor {
    options: SnippetOptions,
}

impl SnippetExtractor {
    pub fn new(options: SnippetOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SnippetOptions {
        &self.options
    }

    pub fn extract(&self, text: &str, query: &PreparedQuery) -> Snippet {
        let (units, separator) = split_units(text, self.options.unit);
        let folded: Vec<String> = units.iter().map(|u| normalize(u)).collect();
        let phrase_hits = hit_units(&folded, |u| u.contains(query.normalized()));
        let has_phrase = !phrase_hits.is_empty();
        let hits = if has_phrase {
            phrase_hits
        } else {
            hit_units(&folded, |u| query.words().iter().any(|w| u.contains(w.as_str())))
        };

        let (Some(&first), Some(&last)) = (hits.first(), hits.last()) else {
            let rendered = highlight(head(text, self.options.max_chars), query);
            return Snippet { text: self.finish(&rendered), matched: false };
        };

        let n = self.options.context;
        let mut lo = first.saturating_sub(n);
        let mut hi = (last + n + 1).min(units.len());
        let mut rendered = render(&units[lo..hi], separator, query);
        if rendered.chars().count() < self.options.min_chars {
            lo = lo.saturating_sub(n);
            hi = (hi + n).min(units.len());
            rendered = render(&units[lo..hi], separator, query);
        }
        let mut snippet = self.finish(&rendered);
        if !has_phrase {
            return Snippet { text: snippet, matched: true };
        }

        // The cut keeps the first phrase hit: shed leading context, then
        // start inside the hit unit itself.
        while lo < first && !shows_phrase(&snippet, query) {
            lo += 1;
            snippet = self.finish(&render(&units[lo..hi], separator, query));
        }
        if !shows_phrase(&snippet, query) {
            let mut window = units[first..hi].to_vec();
            window[0] = from_phrase(window[0], query);
            snippet = self.finish(&render(&window, separator, query));
        }
        Snippet { text: snippet, matched: true }
    }

    /// Explicit line breaks, allow-list filtering, then the length cut.
    fn finish(&self, rendered: &str) -> String {
        let with_breaks = rendered.replace("\r\n", "\n").replace('\n', LINE_BREAK);
        truncate_markup(&sanitize(&with_breaks), self.options.max_chars)
    }
}

impl Default for SnippetExtractor {
    fn default() -> Self {
        Self::new(SnippetOptions::default())
    }
}

fn hit_units(folded_units: &[String], matches: impl Fn(&str) -> bool) -> Vec<usize> {
    folded_units.iter().enumerate().filter(|(_, u)| matches(u)).map(|(i, _)| i).collect()
}

/// True if the rendered snippet, markers removed, still holds the query phrase.
fn shows_phrase(snippet: &str, query: &PreparedQuery) -> bool {
    let plain = snippet.replace(LINE_BREAK, " ").replace(MARK_OPEN, "").replace(MARK_CLOSE, "");
    normalize(&plain).contains(query.normalized())
}

/// Tail of `unit` starting at its first phrase occurrence.
fn from_phrase<'a>(unit: &'a str, query: &PreparedQuery) -> &'a str {
    match FoldedText::new(unit).find_all(query.normalized(), false).first() {
        Some(range) => &unit[range.start..],
        None => unit,
    }
}

/// Units and the separator that rejoins them into the source text.
fn split_units(text: &str, unit: ContextUnit) -> (Vec<&str>, &'static str) {
    match unit {
        ContextUnit::Line => (text.split('\n').collect(), "\n"),
        ContextUnit::Sentence => (text.split_sentence_bounds().collect(), ""),
    }
}

fn render(units: &[&str], separator: &str, query: &PreparedQuery) -> String {
    units.iter().map(|u| highlight(u, query)).collect::<Vec<_>>().join(separator).trim().to_string()
}

fn head(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}
