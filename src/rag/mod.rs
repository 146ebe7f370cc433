//! Retrieval Augmented Generation (RAG) Pipeline
//!
//! # Module Structure
//!
//! - [`loader`] - Path validation and per-format text extraction (pdf, txt, csv)
//! - [`chunker`] - Fixed-size overlapping windows over extracted text
//! - [`embeddings`] - Embedding providers and the timeout-bounded gateway
//! - [`cache`] - Fingerprint-keyed index cache with single-flight builds
//! - [`answer`] - Question embedding, retrieval and prompt assembly
//!
//! # RAG Pipeline
//!
//! 1. **Ingestion** - A document is extracted, chunked and embedded
//! 2. **Indexing** - Vectors and chunks form an `askdoc_index::VectorIndex`,
//!    persisted per cache key
//! 3. **Retrieval** - The question is embedded and the top-k chunks retrieved
//! 4. **Generation** - The language model answers from the retrieved context
//!
//! # Example
//!
//! ```ignore
//! use askdoc::rag::{answer::AnswerEngine, cache::DocumentCache};
//! use askdoc::types::Document;
//!
//! let document = Document::open("handbook.pdf").await?;
//! let index = cache.get_or_build(&document).await?;
//! let text = engine.answer("How many vacation days do I get?", &index).await?;
//! ```

pub mod answer;
pub mod cache;
pub mod chunker;
pub mod embeddings;
pub mod loader;
