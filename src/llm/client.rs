//! LLM client abstraction and provider selection
//!
//! Two providers are supported, both over the OpenAI-compatible chat
//! completions API:
//! - **OpenAI**: `https://api.openai.com/v1` (or any compatible gateway)
//! - **Ollama**: a local Ollama server through its `/v1` compatibility layer

use crate::types::{AppError, Result};
use crate::utils::toml_config::{LlmConfig, ProviderKind};
use async_trait::async_trait;
use std::time::Duration;

/// Generic LLM client trait for provider abstraction
///
/// The answer engine only depends on this trait, so tests can substitute a
/// scripted client.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a single user prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Provider enum for runtime selection
#[derive(Clone)]
pub enum Provider {
    /// OpenAI API provider (including compatible gateways)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    ///     temperature: 0.0,
    ///     timeout: Duration::from_secs(120),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        temperature: f32,
        timeout: Duration,
    },

    /// Ollama local LLM provider
    ///
    /// `base_url` is the server root, e.g. `http://localhost:11434`.
    Ollama {
        base_url: String,
        model: String,
        temperature: f32,
        timeout: Duration,
    },
}

impl Provider {
    /// Resolve a provider from the `[llm]` config section.
    ///
    /// The OpenAI key is read from the environment variable named by
    /// `api_key_env`; the key itself never appears in config files.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        match config.provider {
            ProviderKind::OpenAI => {
                let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                    AppError::Configuration(format!(
                        "Environment variable {} is not set",
                        config.api_key_env
                    ))
                })?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: config
                        .api_base
                        .clone()
                        .unwrap_or_else(|| ProviderKind::OpenAI.default_base().to_string()),
                    model: config.model.clone(),
                    temperature: config.temperature,
                    timeout,
                })
            }
            ProviderKind::Ollama => Ok(Provider::Ollama {
                base_url: config
                    .api_base
                    .clone()
                    .unwrap_or_else(|| ProviderKind::Ollama.default_base().to_string()),
                model: config.model.clone(),
                temperature: config.temperature,
                timeout,
            }),
        }
    }

    /// Create a client instance for this provider
    pub fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                temperature,
                timeout,
            } => Ok(Box::new(super::openai::OpenAIClient::new(
                Some(api_key.clone()),
                api_base.clone(),
                model.clone(),
                *temperature,
                *timeout,
            )?)),

            Provider::Ollama {
                base_url,
                model,
                temperature,
                timeout,
            } => Ok(Box::new(super::openai::OpenAIClient::new(
                None,
                ollama_api_base(base_url),
                model.clone(),
                *temperature,
                *timeout,
            )?)),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::OpenAI {
                api_base, model, ..
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"<redacted>")
                .field("api_base", api_base)
                .field("model", model)
                .finish(),
            Provider::Ollama {
                base_url, model, ..
            } => f
                .debug_struct("Ollama")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
        }
    }
}

/// Ollama serves the OpenAI-compatible API under `/v1`.
pub(crate) fn ollama_api_base(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{}/v1", trimmed)
    }
}
