//! Deterministic truncation of provider input.

use std::borrow::Cow;

/// Appended when text had to be cut mid-sentence.
pub const TRUNCATION_MARKER: &str = " [...]";

/// Cuts `text` to at most `limit` characters.
///
/// Text that fits is returned untouched. Otherwise the cut lands after the
/// last sentence terminator (`.`, `!` or `?` followed by whitespace) inside
/// the limit; without one the text is hard-cut and [`TRUNCATION_MARKER`]
/// appended, the marker counting toward the limit.
pub fn truncate_for_budget(text: &str, limit: usize) -> Cow<'_, str> {
    if text.chars().count() <= limit {
        return Cow::Borrowed(text);
    }

    let head = prefix(text, limit);
    if let Some(end) = last_sentence_end(text, head.len()) {
        return Cow::Borrowed(&text[..end]);
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if limit <= marker_len {
        return Cow::Borrowed(head);
    }

    let cut = prefix(text, limit - marker_len).trim_end();
    Cow::Owned(format!("{cut}{TRUNCATION_MARKER}"))
}

/// The first `chars` characters of `text`.
fn prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Byte offset just past the last sentence terminator in `text[..within]`
/// that is followed by whitespace.
fn last_sentence_end(text: &str, within: usize) -> Option<usize> {
    text[..within]
        .char_indices()
        .filter(|(_, c)| matches!(c, '.' | '!' | '?'))
        .map(|(idx, c)| idx + c.len_utf8())
        .filter(|end| {
            text[*end..]
                .chars()
                .next()
                .is_some_and(char::is_whitespace)
        })
        .last()
}
