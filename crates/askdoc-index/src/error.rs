//! Error types for askdoc-index.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for askdoc-index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, querying or persisting an index.
#[derive(Error, Debug)]
pub enum Error {
    /// A vector's dimension differs from the index dimension.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions.
        expected: usize,
        /// Actual dimensions provided.
        actual: usize,
    },

    /// Chunks and vectors were not paired one-to-one.
    #[error("Length mismatch: {chunks} chunks but {vectors} vectors")]
    LengthMismatch {
        /// Number of chunks supplied.
        chunks: usize,
        /// Number of vectors supplied.
        vectors: usize,
    },

    /// Invalid vector (e.g., empty, contains NaN).
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// The persisted bundle could not be decoded or is internally inconsistent.
    #[error("Corrupt index at {}: {reason}", path.display())]
    CorruptIndex {
        /// Location of the bundle.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Serialization failed while writing a bundle.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptIndex {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
