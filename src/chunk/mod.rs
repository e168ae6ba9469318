//! Text chunking for indexing
//!
//! Splits document text into fixed-size character windows with overlap.
//! When a window boundary falls mid-sentence, the cut point is moved back
//! to the nearest sentence terminator (searching at most half a window) so
//! sentences are kept intact where possible.

use crate::config::ChunkConfig;
use blake3::Hasher;

/// Sentence terminators recognized when adjusting a window boundary.
const SENTENCE_TERMINATORS: &[char] = &['。', '？', '！', '.', '?', '!'];

/// A text chunk with position metadata
#[derive(Debug, Clone)]
pub struct TextChunk {
    /// The chunk text, trimmed
    pub text: String,

    /// Chunk index (0-based)
    pub index: usize,

    /// Character start position in the original document
    pub char_start: usize,

    /// Character end position in the original document
    pub char_end: usize,

    /// Blake3 hash of the chunk text, salted with the document hash
    pub hash: String,
}

impl TextChunk {
    pub fn compute_hash(text: &str, doc_hash: &str) -> String {
        let mut hasher = Hasher::new();
        hasher.update(doc_hash.as_bytes());
        hasher.update(text.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

/// Split text into overlapping chunks.
///
/// Windows are measured in characters, never splitting a UTF-8 code point.
/// The overlap is applied from the actual cut position, so a sentence-
/// adjusted boundary shifts the following window with it.
pub fn split_text(text: &str, doc_hash: &str, config: &ChunkConfig) -> Vec<TextChunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .collect();
    let total_chars = boundaries.len();
    let byte_at = |char_idx: usize| -> usize {
        if char_idx >= total_chars {
            text.len()
        } else {
            boundaries[char_idx]
        }
    };

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < total_chars {
        let mut end = (start + config.max_chars).min(total_chars);

        if end < total_chars {
            end = adjust_to_sentence_end(&chars, start, end, config.max_chars / 2);
        }

        let chunk_text = text[byte_at(start)..byte_at(end)].trim().to_string();
        if !chunk_text.is_empty() {
            let hash = TextChunk::compute_hash(&chunk_text, doc_hash);
            chunks.push(TextChunk {
                text: chunk_text,
                index: chunks.len(),
                char_start: start,
                char_end: end,
                hash,
            });
        }

        if end >= total_chars {
            break;
        }

        let next = end.saturating_sub(config.overlap_chars);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Move the cut position back to just after the nearest sentence terminator,
/// searching at most `max_back` characters. Returns the original position
/// when no terminator is in range.
fn adjust_to_sentence_end(chars: &[char], start: usize, end: usize, max_back: usize) -> usize {
    let floor = end.saturating_sub(max_back).max(start + 1);
    let mut pos = end;
    while pos > floor {
        if SENTENCE_TERMINATORS.contains(&chars[pos - 1]) {
            return pos;
        }
        pos -= 1;
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_chars: usize, overlap_chars: usize) -> ChunkConfig {
        ChunkConfig {
            max_chars,
            overlap_chars,
        }
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_text("A short document.", "doc", &config(1500, 300));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "A short document.");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(split_text("", "doc", &config(1500, 300)).is_empty());
        assert!(split_text("   \n  ", "doc", &config(1500, 300)).is_empty());
    }

    #[test]
    fn test_cuts_at_sentence_terminator() {
        // 40-char window over text with a period at position 30
        let text = format!("{}. {}", "a".repeat(29), "b".repeat(60));
        let chunks = split_text(&text, "doc", &config(40, 5));
        // First chunk ends just after the period, not at the raw boundary
        assert!(chunks[0].text.ends_with('.'));
        assert_eq!(chunks[0].char_end, 30);
    }

    #[test]
    fn test_raw_cut_when_no_terminator_in_range() {
        let text = "x".repeat(100);
        let chunks = split_text(&text, "doc", &config(40, 10));
        assert_eq!(chunks[0].char_end, 40);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn test_overlap_between_windows() {
        let text = "x".repeat(100);
        let chunks = split_text(&text, "doc", &config(40, 10));
        assert_eq!(chunks[1].char_start, 30);
    }

    #[test]
    fn test_cjk_text_chunks_on_char_boundaries() {
        let text = "这是第一句话。这是第二句话。这是第三句话。".repeat(10);
        let chunks = split_text(&text, "doc", &config(50, 10));
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 50);
        }
        // Sentence-aware cuts land after the Chinese full stop
        assert!(chunks[0].text.ends_with('。'));
    }

    #[test]
    fn test_chunk_hash_is_stable_and_doc_scoped() {
        let h1 = TextChunk::compute_hash("same text", "doc-a");
        let h2 = TextChunk::compute_hash("same text", "doc-a");
        let h3 = TextChunk::compute_hash("same text", "doc-b");
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
    }
}
