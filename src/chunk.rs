//! Sliding-window text chunker with boundary preference.
//!
//! Splits extracted document text into [`Chunk`]s of at most `chunk_size`
//! bytes, with `chunk_overlap` bytes carried between consecutive windows so
//! context survives the cut. When a window must end mid-text the split point
//! backs up to the largest semantic boundary available inside the window:
//! paragraph (`\n\n`), then sentence end, then word. A raw cut is the
//! fallback when none is found past the window midpoint.
//!
//! Sizes are byte counts snapped to UTF-8 character boundaries; for the
//! ASCII-dominated text PDFs yield they coincide with character counts.
//!
//! Each chunk receives a UUID plus a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Split text into overlapping chunks. Returns chunks with contiguous
/// indices starting at 0; empty or whitespace-only text yields none.
pub fn chunk_text(filename: &str, text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let text = text.trim();
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index: i64 = 0;

    while start < text.len() {
        let hard_end = floor_char_boundary(text, (start + chunk_size).min(text.len()));
        let end = if hard_end < text.len() {
            find_split_point(text, start, hard_end)
        } else {
            hard_end
        };

        let piece = text[start..end].trim();
        if !piece.is_empty() {
            chunks.push(make_chunk(filename, index, piece));
            index += 1;
        }

        if end >= text.len() {
            break;
        }

        // Step the next window back by the overlap, but always forward
        // relative to the previous start so the loop terminates.
        let next = end.saturating_sub(chunk_overlap).max(start + 1);
        start = ceil_char_boundary(text, next);
    }

    chunks
}

/// Pick the split point for a window ending at `hard_end`, preferring the
/// latest paragraph break, then sentence end, then word gap. Candidates in
/// the first half of the window are rejected to avoid degenerate chunks.
fn find_split_point(text: &str, start: usize, hard_end: usize) -> usize {
    let window = &text[start..hard_end];
    let min_split = window.len() / 2;

    if let Some(pos) = window.rfind("\n\n") {
        let split = pos + 2;
        if split > min_split {
            return start + split;
        }
    }

    let sentence = [". ", "! ", "? ", "\n"]
        .iter()
        .filter_map(|sep| window.rfind(sep).map(|pos| pos + sep.len()))
        .max();
    if let Some(split) = sentence {
        if split > min_split {
            return start + split;
        }
    }

    if let Some(pos) = window.rfind(' ') {
        let split = pos + 1;
        if split > min_split {
            return start + split;
        }
    }

    hard_end
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

fn make_chunk(filename: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        filename: filename.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_text_single_chunk() {
        let chunks = chunk_text("doc.pdf", "Hello, world!", 1000, 150);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("doc.pdf", "", 1000, 150).is_empty());
        assert!(chunk_text("doc.pdf", "   \n\n  ", 1000, 150).is_empty());
    }

    #[test]
    fn windows_respect_size_bound() {
        let text = (0..200)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text("doc.pdf", &text, 100, 20);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.len() <= 100, "chunk too large: {}", c.text.len());
        }
    }

    #[test]
    fn indices_contiguous_from_zero() {
        let text = (0..200)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text("doc.pdf", &text, 100, 20);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = (0..200)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text("doc.pdf", &text, 100, 20);
        for i in 1..chunks.len() {
            // The head of each chunk comes from the tail of its predecessor.
            let head: String = chunks[i].text.chars().take(8).collect();
            assert!(
                chunks[i - 1].text.contains(&head),
                "chunk {} head {:?} not found in predecessor",
                i,
                head
            );
        }
    }

    #[test]
    fn no_content_lost() {
        let text = (0..200)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text("doc.pdf", &text, 100, 20);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        for i in 0..200 {
            let word = format!("word{}", i);
            assert!(joined.contains(&word), "missing {}", word);
        }
    }

    #[test]
    fn prefers_paragraph_boundary() {
        let para1 = "a".repeat(70);
        let para2 = "b".repeat(70);
        let text = format!("{}\n\n{}", para1, para2);
        let chunks = chunk_text("doc.pdf", &text, 100, 10);
        assert_eq!(chunks[0].text, para1);
    }

    #[test]
    fn prefers_sentence_over_word_boundary() {
        let text = format!("{}. {}", "x".repeat(60), "y z ".repeat(20));
        let chunks = chunk_text("doc.pdf", &text, 100, 10);
        assert_eq!(chunks[0].text, format!("{}.", "x".repeat(60)));
    }

    #[test]
    fn multibyte_text_does_not_panic() {
        let text = "größer ".repeat(300);
        let chunks = chunk_text("doc.pdf", &text, 100, 20);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.text.len() <= 100);
        }
    }

    #[test]
    fn hard_cut_when_no_boundary() {
        let text = "q".repeat(250);
        let chunks = chunk_text("doc.pdf", &text, 100, 20);
        assert!(chunks.len() >= 3);
        assert_eq!(chunks[0].text.len(), 100);
    }

    #[test]
    fn deterministic_text_and_hash() {
        let text = "Alpha beta gamma. ".repeat(40);
        let a = chunk_text("doc.pdf", &text, 120, 30);
        let b = chunk_text("doc.pdf", &text, 120, 30);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.hash, y.hash);
            assert_eq!(x.chunk_index, y.chunk_index);
        }
    }
}
