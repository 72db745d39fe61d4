//! Query highlighting on original (unfolded) text.

use std::ops::Range;

use crate::normalize::FoldedText;
use crate::query::PreparedQuery;

pub const MARK_OPEN: &str = "<mark>";
pub const MARK_CLOSE: &str = "</mark>";

/// Wrap whole-word, case-insensitive occurrences of the query phrase in
/// `<mark>` tags. Query words occurring outside a phrase hit are marked too.
/// Matching runs on the folded text; the marks wrap the original characters.
pub fn highlight(text: &str, query: &PreparedQuery) -> String {
    let folded = FoldedText::new(text);
    let mut spans = folded.find_all(query.normalized(), true);
    if !query.is_single_word() {
        for word in query.words() {
            for r in folded.find_all(word, true) {
                if !spans.iter().any(|s| overlaps(s, &r)) {
                    spans.push(r);
                }
            }
        }
    }
    if spans.is_empty() {
        return text.to_string();
    }
    spans.sort_by_key(|r| r.start);

    let mut out = String::with_capacity(text.len() + spans.len() * (MARK_OPEN.len() + MARK_CLOSE.len()));
    let mut cursor = 0;
    for span in spans {
        if span.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..span.start]);
        out.push_str(MARK_OPEN);
        out.push_str(&text[span.clone()]);
        out.push_str(MARK_CLOSE);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}
