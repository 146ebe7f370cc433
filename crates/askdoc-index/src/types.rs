//! Chunk and search result types stored in an index.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a chunk came from inside its document.
///
/// The variant depends on the document format: pages for PDFs, rows for
/// tabular data, line ranges for plain text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLocator {
    /// A 1-based page of a paginated document.
    Page {
        /// Originating file name.
        source: String,
        /// Page number, starting at 1.
        page: u32,
    },
    /// A 0-based data row of a table (header excluded).
    Row {
        /// Originating file name.
        source: String,
        /// Row index, starting at 0.
        row: u64,
    },
    /// An inclusive, 1-based line range.
    Lines {
        /// Originating file name.
        source: String,
        /// First line.
        start: u32,
        /// Last line.
        end: u32,
    },
}

impl SourceLocator {
    /// The originating file name.
    pub fn source(&self) -> &str {
        match self {
            SourceLocator::Page { source, .. }
            | SourceLocator::Row { source, .. }
            | SourceLocator::Lines { source, .. } => source,
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::Page { source, page } => write!(f, "{source} p.{page}"),
            SourceLocator::Row { source, row } => write!(f, "{source} row {row}"),
            SourceLocator::Lines { source, start, end } if start == end => {
                write!(f, "{source} l.{start}")
            }
            SourceLocator::Lines { source, start, end } => write!(f, "{source} l.{start}-{end}"),
        }
    }
}

/// A bounded span of document text, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text.
    pub text: String,
    /// Number of characters shared with the preceding chunk of the same
    /// segment (0 for the first chunk of a segment).
    pub overlap: usize,
    /// Location inside the originating document.
    pub source: SourceLocator,
}

impl Chunk {
    /// Create a chunk with no overlap.
    pub fn new(text: impl Into<String>, source: SourceLocator) -> Self {
        Self {
            text: text.into(),
            overlap: 0,
            source,
        }
    }
}

/// One retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Similarity score (higher = more similar).
    pub score: f32,
    /// Insertion position of the chunk in the index.
    pub position: usize,
}
