/// How far back from a chunk's end to look for a sentence break, in characters.
const SENTENCE_LOOKBACK: usize = 100;

/// Splits text into overlapping, character-bounded spans.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    /// `overlap` must be smaller than `size`; config validation enforces this.
    pub fn new(size: usize, overlap: usize) -> Self {
        Chunker {
            size: size.max(1),
            overlap: overlap.min(size.saturating_sub(1)),
        }
    }

    /// Split `text` into chunks of at most `size` characters.
    ///
    /// Text no longer than `size` comes back unchanged as a single chunk. Longer text
    /// is cut at the last `.` within the final stretch of each window when one exists,
    /// and each next chunk starts `overlap` characters before the previous end, or one
    /// character after the previous start when that would not advance. Chunks are
    /// trimmed and blank ones are dropped.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // Byte offset of every char, plus the end of the text.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let len = bounds.len() - 1;

        if len <= self.size {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let mut end = (start + self.size).min(len);

            if end < len {
                let from = end.saturating_sub(SENTENCE_LOOKBACK).max(start);
                let window = &text[bounds[from]..bounds[end]];
                if let Some(dot) = window.rfind('.') {
                    let dot_char = from + window[..dot].chars().count();
                    if dot_char > start {
                        end = dot_char + 1;
                    }
                }
            }

            let chunk = text[bounds[start]..bounds[end]].trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }

            if end >= len {
                break;
            }
            // Never restart at or before the previous start.
            start = end.saturating_sub(self.overlap).max(start + 1);
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = Chunker::new(500, 100);
        assert_eq!(chunker.split("  Cash 100  "), vec!["  Cash 100  "]);
    }

    #[test]
    fn test_blank_text_has_no_chunks() {
        assert!(Chunker::new(500, 100).split(" \n ").is_empty());
    }

    #[test]
    fn test_chunks_are_bounded_and_cover_text() {
        let text = "word ".repeat(300);
        let chunks = Chunker::new(100, 20).split(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert!(text.trim_start().starts_with(chunks[0].as_str()));
        assert!(text.trim_end().ends_with(chunks.last().unwrap().as_str()));
    }

    #[test]
    fn test_breaks_after_sentence() {
        let text = format!("{}. {}", "a".repeat(80), "b".repeat(100));
        let chunks = Chunker::new(100, 10).split(&text);
        assert_eq!(chunks[0], format!("{}.", "a".repeat(80)));
    }

    #[test]
    fn test_overlap_shares_characters() {
        let text: String = ('a'..='z').cycle().take(150).collect();
        let chunks = Chunker::new(100, 30).split(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(&chunks[1][..30], &chunks[0][70..]);
    }

    #[test]
    fn test_sentence_break_at_start_still_progresses() {
        let text = format!(".{}", "x".repeat(400));
        let chunks = Chunker::new(50, 49).split(&text);
        assert!(!chunks.is_empty());
        assert!(text.ends_with(chunks.last().unwrap().as_str()));
    }

    #[test]
    fn test_stalled_window_restarts_after_previous_start() {
        let text = format!("a.{}", "x".repeat(20));
        let chunks = Chunker::new(10, 9).split(&text);
        assert_eq!(chunks[0], "a.");
        assert_eq!(chunks[1], format!(".{}", "x".repeat(9)));
    }

    #[test]
    fn test_multibyte_text() {
        let text = "ö".repeat(250);
        let chunks = Chunker::new(100, 10).split(&text);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
        assert_eq!(chunks[0].chars().count(), 100);
    }
}
