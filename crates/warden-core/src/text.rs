//! Text helpers shared by renderers and context extraction.

/// Marker appended to text cut by [`truncate`].
pub const TRUNCATION_MARKER: &str = "\n… (truncated)";

/// Largest byte index `<= i` that lies on a char boundary of `s`.
#[must_use]
pub fn floor_char_boundary(s: &str, i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    let mut pos = i;
    while pos > 0 && !s.is_char_boundary(pos) {
        pos = pos.saturating_sub(1);
    }
    pos
}

/// Cut `text` to at most `max_chars` characters, appending
/// [`TRUNCATION_MARKER`] when anything was dropped.
#[must_use]
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let mut out = String::with_capacity(idx.saturating_add(TRUNCATION_MARKER.len()));
            out.push_str(&text[..idx]);
            out.push_str(TRUNCATION_MARKER);
            out
        },
        None => text.to_owned(),
    }
}

/// Cut `text` to at most `max_chars` characters without any marker.
#[must_use]
pub fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
