//! Mock implementations for testing.
//!
//! This module provides a counting embedding provider and a recording LLM
//! client that can be used across test files without duplication.

#![allow(dead_code)]

use askdoc::llm::LLMClient;
use askdoc::rag::embeddings::EmbeddingProvider;
use askdoc::types::{AppError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Dimension of every vector produced by [`MockEmbeddings`].
pub const MOCK_DIMENSIONS: usize = 8;

/// Deterministic embedding provider that counts its calls.
///
/// Vectors are derived from the bytes of each text, so equal texts always
/// embed identically. An optional delay makes concurrent callers overlap.
///
/// # Examples
///
/// ```ignore
/// let mock = Arc::new(MockEmbeddings::new());
/// let service = EmbeddingService::new(mock.clone(), Duration::from_secs(5));
/// service.embed("hello").await?;
/// assert_eq!(mock.batch_calls(), 1);
/// ```
pub struct MockEmbeddings {
    batch_calls: AtomicUsize,
    texts_embedded: AtomicUsize,
    delay: Option<Duration>,
    should_fail: bool,
}

impl MockEmbeddings {
    /// Create a provider that answers immediately.
    pub fn new() -> Self {
        Self {
            batch_calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
            delay: None,
            should_fail: false,
        }
    }

    /// Create a provider that sleeps before answering each batch.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    /// Create a provider that always returns an error.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new()
        }
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }
}

impl Default for MockEmbeddings {
    fn default() -> Self {
        Self::new()
    }
}

/// Bag-of-bytes vector: each byte bumps one of the buckets.
pub fn mock_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; MOCK_DIMENSIONS];
    for byte in text.to_lowercase().bytes().filter(u8::is_ascii_alphanumeric) {
        vector[byte as usize % MOCK_DIMENSIONS] += 1.0;
    }
    vector[0] += 0.5;
    vector
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail {
            return Err(AppError::EmbeddingService(
                "Mock embedding failure".to_string(),
            ));
        }
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| mock_vector(t)).collect())
    }

    fn model_id(&self) -> &str {
        "mock-embeddings"
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn dimensions(&self) -> Option<usize> {
        Some(MOCK_DIMENSIONS)
    }
}

/// Mock LLM client that records every prompt it receives.
pub struct MockLLMClient {
    response: String,
    should_fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockLLMClient {
    /// Create a new mock client that returns the given response.
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            should_fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock client that always returns an error.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new("")
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if self.should_fail {
            return Err(AppError::AnswerEngine("Mock LLM failure".to_string()));
        }
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "mock-llm"
    }
}
