//! Recursive character text splitter.
//!
//! Splits on the coarsest separator present (paragraph, line, word, character),
//! recursing into pieces that are still too long, then merges neighbouring
//! pieces into chunks of at most `chunk_size` characters with `overlap`
//! characters carried over between consecutive chunks.

use std::collections::VecDeque;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl TextSplitter {
    /// Overlap is capped below the chunk size.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let idx = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(idx).copied().unwrap_or("");
        let rest = separators.get(idx + 1..).unwrap_or(&[]);

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            if rest.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, rest));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }
        chunks
    }

    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut out = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        let flush = |window: &VecDeque<&str>, out: &mut Vec<String>| {
            let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
            let trimmed = joined.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_string());
            }
        };

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };
            if total + len + joiner > self.chunk_size && !window.is_empty() {
                flush(&window, &mut out);
                // Drop from the front until only the overlap remains and the next piece fits.
                while total > self.overlap
                    || (total > 0
                        && total + len + if window.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(front) + if window.is_empty() { 0 } else { sep_len };
                }
            }
            total += len + if window.is_empty() { 0 } else { sep_len };
            window.push_back(piece);
        }
        flush(&window, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = TextSplitter::default().split("Open daily 8am to 8pm.");
        assert_eq!(chunks, vec!["Open daily 8am to 8pm.".to_string()]);
    }

    #[test]
    fn test_paragraphs_are_kept_together_when_they_fit() {
        let s = TextSplitter::new(30, 0);
        let chunks = s.split("First paragraph.\n\nSecond one here.\n\nThird.");
        assert_eq!(chunks, vec!["First paragraph.", "Second one here.\n\nThird."]);
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let words: Vec<String> = (0..400).map(|i| format!("word{i}")).collect();
        let text = words.join(" ");
        let s = TextSplitter::new(100, 20);
        let chunks = s.split(&text);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(char_len(c) <= 100, "chunk too long: {}", char_len(c));
        }
        // consecutive chunks share their boundary words
        let last_word_of_first = chunks[0].split(' ').next_back().unwrap();
        assert!(chunks[1].split(' ').any(|w| w == last_word_of_first));
    }

    #[test]
    fn test_unbroken_text_falls_back_to_characters() {
        let text = "ක".repeat(250);
        let chunks = TextSplitter::new(100, 10).split(&text);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| char_len(c) <= 100));
    }

    #[test]
    fn test_overlap_capped_below_size() {
        let s = TextSplitter::new(10, 50);
        assert_eq!(s.overlap, 9);
    }
}
