//! Character-safe text helpers shared by the generation layer.
//!
//! All lengths here are counted in `char`s, never bytes, so truncation can
//! never split a multi-byte character.

use std::borrow::Cow;

/// Marker appended when prompt or request input is cut short.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Number of characters in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte offset of the `max_chars`-th character, or `None` if the text is
/// not longer than that.
fn char_boundary(text: &str, max_chars: usize) -> Option<usize> {
    text.char_indices().nth(max_chars).map(|(idx, _)| idx)
}

/// Keeps at most `max_chars` characters of `text`, appending `marker` only
/// when something was actually cut.
pub fn truncate_with_marker<'a>(text: &'a str, max_chars: usize, marker: &str) -> Cow<'a, str> {
    match char_boundary(text, max_chars) {
        Some(cut) => {
            let mut truncated = String::with_capacity(cut + marker.len());
            truncated.push_str(&text[..cut]);
            truncated.push_str(marker);
            Cow::Owned(truncated)
        }
        None => Cow::Borrowed(text),
    }
}

/// Cheap rolling hash of the input text.
///
/// Used only to notice that the engine is being asked about different text
/// than last time; collisions merely skip a scratch reset.
pub fn fingerprint(text: &str) -> u32 {
    text.chars().fold(0u32, |hash, c| {
        hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(c as u32)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_borrowed_unchanged() {
        let out = truncate_with_marker("hello", 10, TRUNCATION_MARKER);
        assert!(matches!(out, Cow::Borrowed("hello")));
    }

    #[test]
    fn exact_length_is_not_marked() {
        assert_eq!(truncate_with_marker("hello", 5, TRUNCATION_MARKER), "hello");
    }

    #[test]
    fn long_text_is_cut_and_marked() {
        assert_eq!(
            truncate_with_marker("abcdefgh", 3, TRUNCATION_MARKER),
            "abc... [truncated]"
        );
    }

    #[test]
    fn truncation_respects_multibyte_characters() {
        let text = "héllo wörld";
        assert_eq!(truncate_with_marker(text, 2, "…"), "hé…");
        assert_eq!(char_len(text), 11);
    }

    #[test]
    fn fingerprint_is_stable_and_input_sensitive() {
        assert_eq!(fingerprint("same text"), fingerprint("same text"));
        assert_ne!(fingerprint("same text"), fingerprint("other text"));
        assert_eq!(fingerprint(""), 0);
    }
}
