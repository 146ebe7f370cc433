//! TOML-based configuration for askdoc
//!
//! Every field has a default, so an absent or partial `askdoc.toml` is valid.
//! API keys are never stored in the file: provider sections name the
//! environment variable that holds the key.

use askdoc_index::{DistanceMetric, IndexConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::AppError;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "askdoc.toml";

/// Root configuration structure loaded from askdoc.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskdocConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub rag: RagConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAI,
    Ollama,
}

impl ProviderKind {
    pub fn default_base(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::Ollama => "http://localhost:11434",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Ollama => "ollama",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Overrides the provider's default endpoint
    #[serde(default)]
    pub api_base: Option<String>,

    /// Environment variable containing the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Requested output dimension; also enforced on every response
    #[serde(default)]
    pub dimensions: Option<usize>,

    /// Maximum texts per embeddings request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_batch_size() -> usize {
    64
}

fn default_embedding_timeout() -> u64 {
    60
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: default_embedding_model(),
            api_base: None,
            api_key_env: default_api_key_env(),
            dimensions: None,
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default)]
    pub api_base: Option<String>,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: default_llm_model(),
            api_base: None,
            api_key_env: default_api_key_env(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout(),
        }
    }
}

// ============= RAG Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub metric: DistanceMetric,

    /// Indexes larger than this use the HNSW graph for candidate search
    #[serde(default = "default_exact_search_threshold")]
    pub exact_search_threshold: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_top_k() -> usize {
    4
}

fn default_exact_search_threshold() -> usize {
    10_000
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            metric: DistanceMetric::default(),
            exact_search_threshold: default_exact_search_threshold(),
        }
    }
}

impl RagConfig {
    pub fn index_config(&self) -> IndexConfig {
        IndexConfig::with_metric(self.metric)
            .with_exact_search_threshold(self.exact_search_threshold)
    }
}

// ============= Storage & Cache Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding persisted index bundles
    #[serde(default = "default_index_dir")]
    pub index_dir: PathBuf,

    /// Write built indexes to disk and reuse them across runs
    #[serde(default = "default_true")]
    pub persist: bool,
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("./data/indexes")
}

fn default_true() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_dir: default_index_dir(),
            persist: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum resident indexes; 0 keeps every index for the process lifetime
    #[serde(default)]
    pub max_entries: usize,
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl AskdocConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load an explicit file, or fall back to `askdoc.toml` in the working
    /// directory, or to defaults when that does not exist either.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    let config = Self::default();
                    config.validate()?;
                    Ok(config)
                }
            }
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AskdocConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate settings that would otherwise fail deep inside the pipeline
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;
        if rag.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "rag.chunk_size must be greater than 0".into(),
            ));
        }
        if rag.chunk_overlap >= rag.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                rag.chunk_overlap, rag.chunk_size
            )));
        }
        if rag.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "rag.top_k must be greater than 0".into(),
            ));
        }
        if self.embeddings.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embeddings.batch_size must be greater than 0".into(),
            ));
        }
        if self.embeddings.dimensions == Some(0) {
            return Err(ConfigError::ValidationError(
                "embeddings.dimensions must be greater than 0 when set".into(),
            ));
        }
        if self.embeddings.timeout_secs == 0 || self.llm.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "llm.temperature ({}) must be between 0.0 and 2.0",
                self.llm.temperature
            )));
        }
        if self.embeddings.model.trim().is_empty() || self.llm.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "model names must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Render the effective configuration, reporting which key variables are
    /// set without revealing their values.
    pub fn to_display_toml(&self) -> Result<String, AppError> {
        let rendered = toml::to_string_pretty(self)
            .map_err(|e| AppError::Internal(format!("Failed to render config: {}", e)))?;

        let mut notes = Vec::new();
        for env in [&self.embeddings.api_key_env, &self.llm.api_key_env] {
            let state = if std::env::var(env).is_ok() {
                "set, value hidden"
            } else {
                "not set"
            };
            let note = format!("# {} ({})", env, state);
            if !notes.contains(&note) {
                notes.push(note);
            }
        }

        Ok(format!("{}\n{}", notes.join("\n"), rendered))
    }
}
