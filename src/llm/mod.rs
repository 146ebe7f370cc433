//! LLM Provider Clients
//!
//! [`LLMClient`] is the seam between the answer engine and a chat model.
//! [`Provider`] resolves the `[llm]` config section into a concrete client.

/// Core LLM client trait and provider selection.
pub mod client;
/// OpenAI-compatible chat completions over HTTP.
pub mod openai;

pub use client::{LLMClient, Provider};
