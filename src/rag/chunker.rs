//! Sliding-window text chunking with configurable overlap.
//!
//! The chunker walks a document's text with a window of `target_length`
//! characters. Each chunk after the first starts exactly `overlap`
//! characters before the previous chunk's end, so consecutive chunks
//! overlap by exactly `overlap` characters and together cover the whole
//! document with no gaps. The final chunk is whatever text remains and is
//! always emitted, even when shorter than the overlap.
//!
//! Cut points prefer whitespace: when a hard cut would land mid-word, the
//! chunk end snaps back to the last whitespace within `target_length / 10`
//! characters of the cut. This is a quality heuristic only; it never
//! changes the exact-overlap or full-coverage guarantees because the next
//! chunk is positioned relative to the actual end.

use crate::types::{Chunk, Document, RagError, Result};
use uuid::Uuid;

/// Splits documents into overlapping fixed-size chunks.
///
/// A pure function of its inputs: chunking the same document with the same
/// parameters always yields the same offsets (chunk ids are freshly
/// minted each call).
#[derive(Debug, Clone)]
pub struct Chunker {
    target_length: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker.
    ///
    /// Requires `target_length > 0` and `overlap < target_length`.
    pub fn new(target_length: usize, overlap: usize) -> Result<Self> {
        if target_length == 0 {
            return Err(RagError::Configuration(
                "chunk target_length must be > 0".into(),
            ));
        }
        if overlap >= target_length {
            return Err(RagError::Configuration(format!(
                "chunk overlap ({}) must be smaller than target_length ({})",
                overlap, target_length
            )));
        }
        Ok(Self {
            target_length,
            overlap,
        })
    }

    /// Target chunk length in characters.
    pub fn target_length(&self) -> usize {
        self.target_length
    }

    /// Overlap between consecutive chunks in characters.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Lazily chunk a document's content.
    ///
    /// Offsets in the produced chunks are character offsets into
    /// `document.content`. An empty document yields no chunks.
    pub fn chunk<'a>(&self, document: &'a Document) -> Chunks<'a> {
        // Byte offset of every char start, plus the end sentinel, so chunk
        // slices can be taken without re-walking the string.
        let mut byte_offsets: Vec<usize> = Vec::new();
        let mut chars: Vec<char> = Vec::new();
        for (byte, ch) in document.content.char_indices() {
            byte_offsets.push(byte);
            chars.push(ch);
        }
        byte_offsets.push(document.content.len());

        Chunks {
            content: &document.content,
            document_id: document.id,
            byte_offsets,
            chars,
            target_length: self.target_length,
            overlap: self.overlap,
            start: 0,
            sequence_index: 0,
            done: false,
        }
    }
}

/// Lazy iterator over a document's chunks.
pub struct Chunks<'a> {
    content: &'a str,
    document_id: Uuid,
    byte_offsets: Vec<usize>,
    chars: Vec<char>,
    target_length: usize,
    overlap: usize,
    start: usize,
    sequence_index: usize,
    done: bool,
}

impl Chunks<'_> {
    fn slice(&self, start: usize, end: usize) -> &str {
        &self.content[self.byte_offsets[start]..self.byte_offsets[end]]
    }
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let n = self.chars.len();
        if self.done || self.start >= n {
            return None;
        }

        let hard_end = (self.start + self.target_length).min(n);
        let mut end = hard_end;

        if hard_end < n {
            let tolerance = self.target_length / 10;
            let window_start = hard_end.saturating_sub(tolerance).max(self.start);
            if let Some(ws) = (window_start..hard_end)
                .rev()
                .find(|&i| self.chars[i].is_whitespace())
            {
                // Snap only if the shorter chunk still advances past the
                // overlap region, otherwise the walk would stall.
                if ws + 1 > self.start + self.overlap {
                    end = ws + 1;
                }
            }
        }

        let chunk = Chunk {
            id: Uuid::new_v4(),
            document_id: self.document_id,
            text: self.slice(self.start, end).to_string(),
            start_offset: self.start,
            end_offset: end,
            sequence_index: self.sequence_index,
        };
        self.sequence_index += 1;

        if end >= n {
            self.done = true;
        } else {
            self.start = end - self.overlap;
        }

        Some(chunk)
    }
}
