//! Sentence-aware fixed-window chunking with overlap.
//!
//! Long input is cut into windows of at most `max_size` characters. Each
//! window prefers to end just after the last `.` or newline found in its
//! second half; otherwise it ends at the hard boundary. The next window
//! starts `overlap` characters before the previous one ended, so adjacent
//! chunks share a little context.
//!
//! ```text
//! max_size = 10, overlap = 3, no sentence breaks
//!
//! Document: "abcdefghijklmnopqrstu"
//!
//! Chunk 0: "abcdefghij"   [0..10]
//! Chunk 1: "hijklmnopq"   [7..17]   <- starts at 10 - 3
//! Chunk 2: "opqrstu"      [14..21]  <- final chunk reaches the end
//! ```
//!
//! The break search includes the character sitting exactly at the window
//! end, so a chunk may be one character longer than `max_size` when a
//! terminator lands there.

/// Default chunk size, leaving room for prompt overhead.
pub const MAX_CHUNK_SIZE: usize = 4_000;

/// Default number of characters shared by adjacent chunks.
pub const CHUNK_OVERLAP: usize = 100;

/// Splits `text` into ordered, overlapping chunks of roughly `max_size`
/// characters.
///
/// Text that already fits is returned as a single untouched chunk, so the
/// empty string yields `[""]`. Every other chunk is trimmed.
pub fn chunk_text(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    let max_size = max_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    if len <= max_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::with_capacity(len.div_ceil(max_size.saturating_sub(overlap).max(1)));
    let mut start = 0;

    while start < len {
        let mut end = start + max_size;

        if end < len {
            if let Some(break_point) = sentence_break(&chars, start, end) {
                // Only accept breaks past the middle of the window
                if 2 * break_point > 2 * start + max_size {
                    end = break_point + 1;
                }
            }
        }

        let end = end.min(len);
        let chunk: String = chars[start..end].iter().collect();
        chunks.push(chunk.trim().to_string());

        if end >= len {
            break;
        }

        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Index of the last sentence terminator in `chars[start..=end]`.
fn sentence_break(chars: &[char], start: usize, end: usize) -> Option<usize> {
    let last = end.min(chars.len() - 1);
    chars[start..=last]
        .iter()
        .rposition(|c| matches!(c, '.' | '\n'))
        .map(|offset| start + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_returned_untouched() {
        let text = "  padded but short  ";
        assert_eq!(chunk_text(text, 100, 10), vec![text.to_string()]);
    }

    #[test]
    fn empty_text_yields_single_empty_chunk() {
        assert_eq!(chunk_text("", 100, 10), vec![String::new()]);
    }

    #[test]
    fn exact_size_is_a_single_chunk() {
        let text = "a".repeat(50);
        assert_eq!(chunk_text(&text, 50, 5), vec![text]);
    }

    #[test]
    fn hard_boundaries_overlap_by_exactly_overlap() {
        let text: String = ('a'..='u').collect();
        let chunks = chunk_text(&text, 10, 3);
        assert_eq!(chunks, vec!["abcdefghij", "hijklmnopq", "opqrstu"]);
    }

    #[test]
    fn breaks_after_sentence_in_second_half() {
        let text = format!("{}. {}", "a".repeat(70), "b".repeat(80));
        let chunks = chunk_text(&text, 100, 10);
        assert_eq!(chunks[0], format!("{}.", "a".repeat(70)));
        assert!(chunks[1].starts_with('a'));
        assert!(chunks.last().is_some_and(|c| c.ends_with('b')));
    }

    #[test]
    fn ignores_sentence_break_in_first_half() {
        let text = format!("{}. {}", "a".repeat(20), "b".repeat(200));
        let chunks = chunk_text(&text, 100, 10);
        assert_eq!(chunks[0].chars().count(), 100);
    }

    #[test]
    fn newline_counts_as_break() {
        let text = format!("{}\n{}", "a".repeat(80), "b".repeat(80));
        let chunks = chunk_text(&text, 100, 0);
        assert_eq!(chunks[0], "a".repeat(80));
        assert_eq!(chunks[1], "b".repeat(80));
    }

    #[test]
    fn multibyte_text_is_split_on_characters() {
        let text = "é".repeat(25);
        let chunks = chunk_text(&text, 10, 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks[0], "é".repeat(10));
    }

    #[test]
    fn oversized_overlap_still_terminates() {
        let text = "x".repeat(30);
        let chunks = chunk_text(&text, 10, 50);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn default_sizes_split_five_thousand_chars_in_two() {
        let text = "a".repeat(5_000);
        let chunks = chunk_text(&text, MAX_CHUNK_SIZE, CHUNK_OVERLAP);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4_000);
        assert_eq!(chunks[1].len(), 1_100);
    }
}
