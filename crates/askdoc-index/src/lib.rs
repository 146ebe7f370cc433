//! # askdoc-index
//!
//! An embedded vector index for document chunks.
//!
//! - **Build once**: an index is built from `(chunk, vector)` pairs and never
//!   appended to.
//! - **Top-k retrieval**: results are ordered by descending similarity, ties
//!   broken by insertion order.
//! - **HNSW for large indexes**: above a configurable size, `hnsw_rs`
//!   supplies candidates which are re-scored exactly.
//! - **Atomic persistence**: a single-file bundle whose header (format
//!   version, dimension, entry count) is validated before the body is read.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use askdoc_index::{Chunk, IndexConfig, SourceLocator, VectorIndex};
//!
//! let chunks = vec![Chunk::new("hello", SourceLocator::Row { source: "a.csv".into(), row: 0 })];
//! let index = VectorIndex::build(chunks, vec![vec![0.1, 0.9]], IndexConfig::default())?;
//!
//! let hits = index.search(&[0.1, 0.9], 4)?;
//! index.save("./data/indexes/a.askidx").await?;
//! let restored = VectorIndex::load("./data/indexes/a.askidx").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod distance;
pub mod error;
pub mod index;
pub mod persistence;
pub mod types;

pub use config::{HnswConfig, IndexConfig};
pub use distance::DistanceMetric;
pub use error::{Error, Result};
pub use index::VectorIndex;
pub use persistence::{read_header, BundleHeader, FORMAT_VERSION};
pub use types::{Chunk, SearchHit, SourceLocator};
