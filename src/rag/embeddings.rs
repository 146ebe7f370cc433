//! Embedding gateway
//!
//! [`EmbeddingProvider`] is the raw service boundary. [`EmbeddingService`]
//! wraps a provider with request batching, a per-request timeout and the
//! invariants the index depends on: one vector per input, in input order,
//! all of one dimension.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use crate::llm::client::ollama_api_base;
use crate::types::{AppError, Result};
use crate::utils::toml_config::{EmbeddingsConfig, ProviderKind};

/// An external embedding service.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `texts`, returning one vector per input in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Identifier of the model producing the vectors.
    fn model_id(&self) -> &str;

    /// Name of the service hosting the model.
    fn provider_name(&self) -> &str {
        "custom"
    }

    /// Output dimension, when the provider is configured with one.
    fn dimensions(&self) -> Option<usize> {
        None
    }
}

// ============================================================================
// OpenAI-compatible provider
// ============================================================================

/// Embeddings client for OpenAI-compatible `/embeddings` endpoints.
pub struct OpenAIEmbeddings {
    provider: ProviderKind,
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
}

impl OpenAIEmbeddings {
    pub fn new(
        provider: ProviderKind,
        api_key: Option<String>,
        api_base: &str,
        model: String,
        dimensions: Option<usize>,
        timeout: Duration,
    ) -> Result<Self> {
        if model.trim().is_empty() {
            return Err(AppError::Configuration("Embedding model name is empty".into()));
        }

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            let auth = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|_| AppError::Configuration("Invalid embeddings API key".into()))?;
            headers.insert(AUTHORIZATION, auth);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            provider,
            client,
            endpoint: format!("{}/embeddings", api_base.trim_end_matches('/')),
            model,
            dimensions,
        })
    }

    /// Build from the `[embeddings]` config section, resolving the API key
    /// from the environment for OpenAI.
    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let (api_key, api_base) = match config.provider {
            ProviderKind::OpenAI => {
                let key = std::env::var(&config.api_key_env).map_err(|_| {
                    AppError::Configuration(format!(
                        "Environment variable {} is not set",
                        config.api_key_env
                    ))
                })?;
                let base = config
                    .api_base
                    .clone()
                    .unwrap_or_else(|| ProviderKind::OpenAI.default_base().to_string());
                (Some(key), base)
            }
            ProviderKind::Ollama => {
                let base = config
                    .api_base
                    .as_deref()
                    .unwrap_or(ProviderKind::Ollama.default_base());
                (None, ollama_api_base(base))
            }
        };

        Self::new(
            config.provider,
            api_key,
            &api_base,
            config.model.clone(),
            config.dimensions,
            timeout,
        )
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddings {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::EmbeddingService(format!("Embeddings request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(AppError::EmbeddingService(format!(
                "Embeddings endpoint returned {}: {}",
                status, body
            )));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::EmbeddingService(format!("Malformed embeddings response: {}", e))
        })?;
        parsed.data.sort_by_key(|entry| entry.index);

        if parsed.data.len() != inputs.len() {
            return Err(AppError::EmbeddingService(format!(
                "Service returned {} embeddings for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }

        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

// ============================================================================
// Gateway
// ============================================================================

const DEFAULT_BATCH_SIZE: usize = 64;

/// Timeout-bounded, dimension-checked access to an [`EmbeddingProvider`].
#[derive(Clone)]
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
    batch_size: usize,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Maximum texts sent to the provider per request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn from_config(config: &EmbeddingsConfig) -> Result<Self> {
        let provider = OpenAIEmbeddings::from_config(config)?;
        Ok(Self::new(
            Arc::new(provider),
            Duration::from_secs(config.timeout_secs),
        )
        .with_batch_size(config.batch_size))
    }

    pub fn model_id(&self) -> &str {
        self.provider.model_id()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.provider.dimensions()
    }

    /// Embed a single text, typically a question.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| AppError::EmbeddingService("Service returned no embedding".into()))
    }

    /// Embed `texts`, split into provider requests of at most `batch_size`.
    /// Each request is bounded by the timeout. An empty input never reaches
    /// the provider.
    #[instrument(skip(self, texts), fields(model = %self.model_id(), count = texts.len()))]
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = tokio::time::timeout(self.timeout, self.provider.embed_batch(batch))
                .await
                .map_err(|_| {
                    AppError::EmbeddingService(format!(
                        "Embedding {} texts timed out after {}s",
                        batch.len(),
                        self.timeout.as_secs_f32()
                    ))
                })??;
            if embedded.len() != batch.len() {
                return Err(AppError::EmbeddingService(format!(
                    "Expected {} embeddings, got {}",
                    batch.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
        }

        self.check(texts.len(), &vectors)?;
        debug!(
            dimensions = vectors[0].len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Embedded batch"
        );
        Ok(vectors)
    }

    fn check(&self, inputs: usize, vectors: &[Vec<f32>]) -> Result<()> {
        if vectors.len() != inputs {
            return Err(AppError::EmbeddingService(format!(
                "Expected {} embeddings, got {}",
                inputs,
                vectors.len()
            )));
        }

        let expected = self.dimensions().unwrap_or(vectors[0].len());
        if expected == 0 {
            return Err(AppError::EmbeddingService("Service returned empty vectors".into()));
        }
        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != expected {
                return Err(AppError::EmbeddingService(format!(
                    "Dimension mismatch at position {}: expected {}, got {}",
                    position,
                    expected,
                    vector.len()
                )));
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(AppError::EmbeddingService(format!(
                    "Non-finite value in embedding at position {}",
                    position
                )));
            }
        }
        Ok(())
    }
}
