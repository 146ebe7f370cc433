use askdoc_index::{Chunk, SourceLocator};

use crate::rag::loader::Segment;
use crate::types::{AppError, Result};

/// Fixed-size sliding window over characters.
///
/// Consecutive chunks of one segment share exactly `chunk_overlap`
/// characters, no chunk is longer than `chunk_size`, and the tail of a
/// segment always lands in a final (possibly shorter) chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(AppError::Configuration(
                "chunk_size must be greater than 0".into(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(AppError::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split every segment, in order.
    pub fn split(&self, segments: &[Segment]) -> Vec<Chunk> {
        segments
            .iter()
            .flat_map(|segment| self.chunk(&segment.text, &segment.source))
            .collect()
    }

    /// Split one piece of text. Blank text yields no chunks.
    pub fn chunk(&self, text: &str, source: &SourceLocator) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let newlines = matches!(source, SourceLocator::Lines { .. }).then(|| newline_prefix(&chars));
        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(chars.len());
            let source = match &newlines {
                Some(prefix) => narrow(source, prefix, start, end),
                None => source.clone(),
            };
            chunks.push(Chunk {
                text: chars[start..end].iter().collect(),
                overlap: if start == 0 { 0 } else { self.chunk_overlap },
                source,
            });

            if end == chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// `prefix[i]` is the number of newlines in `chars[..i]`.
fn newline_prefix(chars: &[char]) -> Vec<u32> {
    let mut prefix = Vec::with_capacity(chars.len() + 1);
    let mut count = 0u32;
    prefix.push(0);
    for c in chars {
        if *c == '\n' {
            count += 1;
        }
        prefix.push(count);
    }
    prefix
}

/// Restrict a line-range locator to the lines `start..end` touches.
fn narrow(source: &SourceLocator, newlines: &[u32], start: usize, end: usize) -> SourceLocator {
    match source {
        SourceLocator::Lines {
            source,
            start: first_line,
            ..
        } => SourceLocator::Lines {
            source: source.clone(),
            start: first_line + newlines[start],
            end: first_line + newlines[end.saturating_sub(1).max(start)],
        },
        other => other.clone(),
    }
}
