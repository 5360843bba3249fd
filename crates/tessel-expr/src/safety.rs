//! Static denylist
//!
//! Expressions naming any of these are rejected before parsing.

use crate::lexer::is_ident_part;

/// Names that must never appear as a whole word
const BLOCKED_WORDS: &[&str] = &["eval", "setTimeout", "setInterval", "__proto__", "constructor", "prototype"];

/// Names that are blocked only when called
const BLOCKED_CALLS: &[&str] = &["Function", "import"];

/// Properties refused at run time, including computed access
pub fn is_blocked_property(name: &str) -> bool {
    matches!(name, "__proto__" | "constructor" | "prototype")
}

/// First denylisted construct in `source`, if any
pub fn find_blocked(source: &str) -> Option<&'static str> {
    for word in BLOCKED_WORDS {
        if find_word(source, word).is_some() {
            return Some(word);
        }
    }
    for word in BLOCKED_CALLS {
        let mut from = 0;
        while let Some(at) = find_word(&source[from..], word) {
            let end = from + at + word.len();
            if source[end..].trim_start().starts_with('(') {
                return Some(word);
            }
            from = end;
        }
    }
    None
}

/// Byte offset of `word` in `haystack` at identifier boundaries
fn find_word(haystack: &str, word: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(rel) = haystack[from..].find(word) {
        let at = from + rel;
        let end = at + word.len();
        let before_ok = haystack[..at].chars().next_back().is_none_or(|c| !is_ident_part(c));
        let after_ok = haystack[end..].chars().next().is_none_or(|c| !is_ident_part(c));
        if before_ok && after_ok {
            return Some(at);
        }
        from = end;
    }
    None
}
