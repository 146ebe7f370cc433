//! # askdoc
//!
//! Ask natural-language questions about a PDF, text or CSV document.
//!
//! A document is extracted, split into overlapping chunks, embedded through an
//! OpenAI-compatible embedding service and stored in an
//! [`askdoc_index::VectorIndex`]. Questions are embedded the same way, the
//! closest chunks are retrieved, and a language model answers from them.
//!
//! Indexes are cached by content fingerprint and persisted to disk, so asking
//! about the same bytes again skips extraction and embedding entirely.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use askdoc::{AskDoc, AskdocConfig};
//!
//! #[tokio::main]
//! async fn main() -> askdoc::Result<()> {
//!     let config = AskdocConfig::load_or_default(None)?;
//!     let askdoc = AskDoc::from_config(&config)?;
//!
//!     let handle = askdoc.process("handbook.pdf").await?;
//!     let answer = askdoc.ask("How many vacation days do I get?", &handle).await?;
//!     println!("{}", answer);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`rag`] - Loader, chunker, embeddings, document cache and answer engine
//! - [`llm`] - Language model clients
//! - [`session`] - `process` / `ask` entry points and the session transcript
//! - [`utils`] - Configuration and opt-in retry
//! - [`types`] - Documents, fingerprints and the error taxonomy
//! - [`cli`] - Command-line interface

#![warn(rustdoc::missing_crate_level_docs)]

/// Command-line interface.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Retrieval Augmented Generation (RAG) components.
pub mod rag;
/// Programmatic entry points and sessions.
pub mod session;
/// Core types (documents, fingerprints, errors).
pub mod types;
/// Configuration and retry utilities.
pub mod utils;

// Re-export commonly used types
pub use llm::{LLMClient, Provider};
pub use rag::answer::{Answer, AnswerEngine};
pub use rag::cache::{CacheKey, CacheStats, DocumentCache};
pub use rag::embeddings::{EmbeddingProvider, EmbeddingService};
pub use session::{AskDoc, IndexHandle, Session};
pub use types::{AppError, Document, Fingerprint, FormatKind, Result};
pub use utils::toml_config::AskdocConfig;
