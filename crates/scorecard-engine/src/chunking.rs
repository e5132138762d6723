//! Bounded-size chunking of filtered input

/// Default delimiter preferred for chunk boundaries
pub const DEFAULT_DELIMITER: &str = "\n";

/// Splits text into chunks no longer than `max_chunk_size` bytes
///
/// While the remainder is too long, the splitter cuts at the last delimiter before
/// the size cutoff (the delimiter itself is dropped) or, when there is none, hard-cuts
/// at the cutoff. Every chunk is right-trimmed. Identical input always yields
/// identical boundaries.
#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    max_chunk_size: usize,
    delimiter: String,
}

impl ChunkSplitter {
    /// Create a splitter using the default newline delimiter
    pub fn new(max_chunk_size: usize) -> Self {
        Self::with_delimiter(max_chunk_size, DEFAULT_DELIMITER)
    }

    /// Create a splitter with a custom delimiter
    pub fn with_delimiter(max_chunk_size: usize, delimiter: impl Into<String>) -> Self {
        let delimiter = delimiter.into();
        Self {
            max_chunk_size: max_chunk_size.max(1),
            delimiter: if delimiter.is_empty() { DEFAULT_DELIMITER.to_string() } else { delimiter },
        }
    }

    /// Maximum chunk size in bytes
    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Split the given text
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut remaining = text;

        while remaining.len() > self.max_chunk_size {
            let cutoff = floor_char_boundary(remaining, self.max_chunk_size);

            let (chunk, rest) = match remaining[..cutoff].rfind(self.delimiter.as_str()) {
                Some(position) => (
                    &remaining[..position],
                    &remaining[position + self.delimiter.len()..],
                ),
                None => {
                    // A single character wider than the limit still has to make progress
                    let cut = if cutoff == 0 { next_char_boundary(remaining) } else { cutoff };
                    remaining.split_at(cut)
                }
            };

            let chunk = chunk.trim_end();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }
            remaining = rest;
        }

        let tail = remaining.trim_end();
        if !tail.is_empty() || chunks.is_empty() {
            chunks.push(tail.to_string());
        }

        chunks
    }
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn next_char_boundary(text: &str) -> usize {
    text.chars().next().map_or(text.len(), char::len_utf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_no_chunking_needed_for_small_text() {
        let splitter = ChunkSplitter::new(100);
        let chunks = splitter.split("Short text here.   ");
        assert_eq!(chunks, vec!["Short text here.".to_string()]);
    }

    #[test]
    fn test_empty_text() {
        let chunks = ChunkSplitter::new(100).split("");
        assert_eq!(chunks, vec![String::new()]);
    }

    #[test]
    fn test_prefers_delimiter() {
        let text = format!("{}\n...\n{}", "a".repeat(1000), "b".repeat(1000));
        let chunks = ChunkSplitter::new(2000).split(&text);

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with('a'));
        assert!(chunks[1].starts_with('b'));
        assert_eq!(chunks[1], "b".repeat(1000));
    }

    #[test]
    fn test_hard_cut_fallback() {
        let text = format!("{} b", "a".repeat(1999));
        let chunks = ChunkSplitter::new(2000).split(&text);
        assert_eq!(chunks, vec!["a".repeat(1999), "b".to_string()]);
    }

    #[test]
    fn test_transcript_lines() {
        let text = "Agent: Hello, thanks for calling.\nCustomer: Hi, I need help.\nAgent: Sure.";
        let chunks = ChunkSplitter::new(40).split(text);
        assert_eq!(
            chunks,
            vec![
                "Agent: Hello, thanks for calling.".to_string(),
                "Customer: Hi, I need help.\nAgent: Sure.".to_string(),
            ]
        );
    }

    #[test]
    fn test_custom_delimiter() {
        let text = "one---two---three";
        let chunks = ChunkSplitter::with_delimiter(8, "---").split(text);
        assert_eq!(chunks, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_multibyte_hard_cut_stays_on_char_boundary() {
        let text = "é".repeat(10); // 20 bytes
        let chunks = ChunkSplitter::new(5).split(&text);
        for chunk in &chunks {
            assert!(chunk.len() <= 5);
        }
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_leading_delimiter_does_not_emit_empty_chunk() {
        let text = format!("\n{}", "x".repeat(10));
        let chunks = ChunkSplitter::new(5).split(&text);
        assert!(chunks.iter().all(|chunk| !chunk.is_empty()));
    }

    proptest! {
        #[test]
        fn prop_chunks_never_exceed_limit(text in "(?s).{0,400}", max in 4usize..120) {
            let chunks = ChunkSplitter::new(max).split(&text);
            prop_assert!(!chunks.is_empty());
            for chunk in &chunks {
                prop_assert!(chunk.len() <= max);
            }
        }

        #[test]
        fn prop_split_is_deterministic(text in "[a-z \n]{0,300}", max in 1usize..80) {
            let splitter = ChunkSplitter::new(max);
            prop_assert_eq!(splitter.split(&text), splitter.split(&text));
        }

        #[test]
        fn prop_short_text_is_single_trimmed_chunk(text in "(?s).{0,60}") {
            prop_assume!(text.len() <= 200);
            let chunks = ChunkSplitter::new(200).split(&text);
            prop_assert_eq!(chunks, vec![text.trim_end().to_string()]);
        }
    }
}
