//! Allow-list markup filter for snippet output.
//!
//! Only the line-break and highlight markers survive, rewritten to their
//! canonical forms with attributes dropped. Every other tag, comment or
//! declaration is stripped, keeping its inner text. Stray angle brackets are
//! escaped.

use std::sync::OnceLock;

use regex::Regex;

use crate::highlight::{MARK_CLOSE, MARK_OPEN};

pub const LINE_BREAK: &str = "<br/>";

const ESCAPED_LT: &str = "&lt;";
const ESCAPED_GT: &str = "&gt;";

fn markup() -> &'static Regex {
    static MARKUP: OnceLock<Regex> = OnceLock::new();
    MARKUP.get_or_init(|| {
        Regex::new(r"(?s)<!--.*?-->|<[!?][^>]*>|<(/?)([A-Za-z][A-Za-z0-9:-]*)(?:\s[^<>]*)?/?>")
            .expect("markup pattern is valid")
    })
}

pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;
    for caps in markup().captures_iter(input) {
        let Some(m) = caps.get(0) else { continue };
        escape_into(&input[cursor..m.start()], &mut out);
        cursor = m.end();
        let Some(name) = caps.get(2) else { continue };
        let closing = caps.get(1).is_some_and(|c| !c.as_str().is_empty());
        match (name.as_str().to_ascii_lowercase().as_str(), closing) {
            ("br", _) => out.push_str(LINE_BREAK),
            ("mark", false) => out.push_str(MARK_OPEN),
            ("mark", true) => out.push_str(MARK_CLOSE),
            _ => {}
        }
    }
    escape_into(&input[cursor..], &mut out);
    out
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '<' => out.push_str(ESCAPED_LT),
            '>' => out.push_str(ESCAPED_GT),
            _ => out.push(c),
        }
    }
}

/// Cut sanitized markup to at most `max_chars` characters without splitting a
/// marker or escape, closing a highlight left open by the cut.
pub fn truncate_markup(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let close_len = MARK_CLOSE.len();
    let mut out = String::new();
    let mut count = 0;
    let mut open = false;
    let mut rest = input;
    while let Some(token) = next_token(rest) {
        let len = token.chars().count();
        let reserve = match token {
            MARK_OPEN => close_len + 1,
            MARK_CLOSE => 0,
            _ if open => close_len,
            _ => 0,
        };
        if count + len + reserve > max_chars {
            break;
        }
        match token {
            MARK_OPEN => open = true,
            MARK_CLOSE => open = false,
            _ => {}
        }
        out.push_str(token);
        count += len;
        rest = &rest[token.len()..];
    }
    if open {
        out.push_str(MARK_CLOSE);
    }
    out
}

fn next_token(s: &str) -> Option<&str> {
    const ATOMS: [&str; 5] = [LINE_BREAK, MARK_OPEN, MARK_CLOSE, ESCAPED_LT, ESCAPED_GT];
    if let Some(atom) = ATOMS.iter().find(|a| s.starts_with(**a)) {
        return Some(&s[..atom.len()]);
    }
    let c = s.chars().next()?;
    Some(&s[..c.len_utf8()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_allowed_markers() {
        let dirty = r#"<p class="x">Hi <b>there</b><br> <MARK id=1>you</mark><script>alert(1)</script><!-- c --></p>"#;
        assert_eq!(sanitize(dirty), "Hi there<br/> <mark>you</mark>alert(1)");
    }

    #[test]
    fn escapes_stray_brackets() {
        assert_eq!(sanitize("a < b > c"), "a &lt; b &gt; c");
        assert_eq!(sanitize("x <3"), "x &lt;3");
    }

    #[test]
    fn br_variants_are_canonical() {
        assert_eq!(sanitize("a<br/>b<br />c<BR>d</br>"), "a<br/>b<br/>c<br/>d<br/>");
    }

    #[test]
    fn truncation_never_splits_markers() {
        let s = "abc<mark>defgh</mark>ij";
        for max in 0..=s.len() + 2 {
            let t = truncate_markup(s, max);
            assert!(t.chars().count() <= max, "max={max} got {t:?}");
            assert_eq!(t.matches(MARK_OPEN).count(), t.matches(MARK_CLOSE).count(), "balanced at max={max}: {t:?}");
        }
        assert_eq!(truncate_markup(s, 100), s);
        assert_eq!(truncate_markup("ab&lt;cd", 3), "ab");
    }
}
