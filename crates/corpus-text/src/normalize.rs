//! Canonical folding of text for match comparisons.
//!
//! Folding applies, per grapheme cluster: NFKC composition, typographic
//! ligature and punctuation replacement, and lower-casing. Runs of whitespace
//! collapse to one ASCII space and the result is trimmed. [`FoldedText`] keeps
//! a map back to the original so callers can act on the user-visible text.

use std::ops::Range;

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

const LIGATURES: &[(char, &str)] = &[
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
    ('\u{FB05}', "st"),
    ('\u{FB06}', "st"),
];

const PUNCTUATION: &[(char, &str)] = &[
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{2013}', "-"),
    ('\u{2014}', "-"),
    ('\u{2026}', "..."),
    ('\u{2032}', "'"),
    ('\u{2033}', "\""),
];

/// Canonical comparison form of `text`.
pub fn normalize(text: &str) -> String {
    FoldedText::new(text).into_folded()
}

/// Word characters for boundary checks: letters, digits and underscore.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn fold_char(c: char, out: &mut String) {
    if let Some((_, s)) = LIGATURES.iter().chain(PUNCTUATION).find(|(from, _)| *from == c) {
        out.push_str(s);
    } else {
        out.extend(c.to_lowercase());
    }
}

fn fold_grapheme(g: &str) -> String {
    let mut out = String::with_capacity(g.len());
    for c in g.nfkc() {
        fold_char(c, &mut out);
    }
    out
}

#[derive(Debug, Clone, Copy)]
struct Piece {
    folded_start: usize,
    original: (usize, usize),
}

/// Folded form of a string together with the origin of every folded piece.
#[derive(Debug, Clone)]
pub struct FoldedText<'a> {
    original: &'a str,
    folded: String,
    pieces: Vec<Piece>,
}

impl<'a> FoldedText<'a> {
    pub fn new(original: &'a str) -> Self {
        let mut folded = String::with_capacity(original.len());
        let mut pieces = Vec::new();
        let mut pending_space: Option<(usize, usize)> = None;
        for (start, g) in original.grapheme_indices(true) {
            let end = start + g.len();
            let piece = fold_grapheme(g);
            if piece.trim().is_empty() {
                if !folded.is_empty() {
                    pending_space = Some(match pending_space { Some((s, _)) => (s, end), None => (start, end) });
                }
                continue;
            }
            if let Some(span) = pending_space.take() {
                pieces.push(Piece { folded_start: folded.len(), original: span });
                folded.push(' ');
            }
            pieces.push(Piece { folded_start: folded.len(), original: (start, end) });
            folded.push_str(&piece);
        }
        Self { original, folded, pieces }
    }

    pub fn folded(&self) -> &str {
        &self.folded
    }

    pub fn original(&self) -> &'a str {
        self.original
    }

    pub fn into_folded(self) -> String {
        self.folded
    }

    /// Original byte range covering the folded byte range `range`. Ranges that
    /// start or end inside a folded piece widen to the whole source grapheme.
    pub fn original_range(&self, range: Range<usize>) -> Option<Range<usize>> {
        if range.start >= range.end || range.end > self.folded.len() {
            return None;
        }
        let first = self.pieces.partition_point(|p| p.folded_start <= range.start).checked_sub(1)?;
        let last = self.pieces.partition_point(|p| p.folded_start < range.end).checked_sub(1)?;
        Some(self.pieces[first].original.0..self.pieces[last].original.1)
    }

    /// True if a regex-style `\b` holds at folded byte offset `pos`.
    pub fn is_boundary(&self, pos: usize) -> bool {
        let before = self.folded[..pos].chars().next_back().is_some_and(is_word_char);
        let after = self.folded[pos..].chars().next().is_some_and(is_word_char);
        before != after
    }

    /// Non-overlapping occurrences of the already folded `needle`, as original
    /// byte ranges, left to right. With `word_bounded`, an occurrence must sit
    /// on `\b` boundaries at both ends.
    pub fn find_all(&self, needle: &str, word_bounded: bool) -> Vec<Range<usize>> {
        if needle.is_empty() {
            return Vec::new();
        }
        self.folded
            .match_indices(needle)
            .map(|(start, m)| start..start + m.len())
            .filter(|r| !word_bounded || (self.is_boundary(r.start) && self.is_boundary(r.end)))
            .filter_map(|r| self.original_range(r))
            .collect()
    }
}
