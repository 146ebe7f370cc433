//! Programmatic entry points: `process` a document, then `ask` questions
//! about it.

use askdoc_index::VectorIndex;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

use crate::llm::{LLMClient, Provider};
use crate::rag::answer::{Answer, AnswerEngine};
use crate::rag::cache::{CacheKey, DocumentCache};
use crate::rag::embeddings::EmbeddingService;
use crate::types::{AppError, Document, Exchange, Result};
use crate::utils::toml_config::AskdocConfig;

/// A ready-to-query index and where it came from.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    /// Set when the index was built (or warm-loaded) from a document.
    pub key: Option<CacheKey>,
    /// The document or bundle path the index was produced from.
    pub origin: PathBuf,
    pub index: Arc<VectorIndex>,
}

impl IndexHandle {
    /// Stable identifier recorded in transcripts: the content fingerprint
    /// for documents, the bundle file stem otherwise.
    pub fn id(&self) -> String {
        match &self.key {
            Some(key) => key.fingerprint().to_hex(),
            None => self
                .origin
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.origin.display().to_string()),
        }
    }
}

/// The document cache and answer engine behind a shared handle.
pub struct AskDoc {
    cache: Arc<DocumentCache>,
    engine: AnswerEngine,
}

impl AskDoc {
    pub fn new(cache: Arc<DocumentCache>, engine: AnswerEngine) -> Self {
        Self { cache, engine }
    }

    /// Wire up providers, cache and engine from configuration.
    pub fn from_config(config: &AskdocConfig) -> Result<Self> {
        config.validate()?;

        let embeddings = EmbeddingService::from_config(&config.embeddings)?;
        let provider = Provider::from_config(&config.llm)?;
        let llm: Arc<dyn LLMClient> = Arc::from(provider.create_client()?);
        info!(
            embeddings = %embeddings.model_id(),
            llm = %provider.model(),
            provider = provider.name(),
            "Initialized providers"
        );

        let cache = DocumentCache::from_config(config, embeddings.clone())?;
        let engine = AnswerEngine::new(
            embeddings,
            llm,
            Duration::from_secs(config.llm.timeout_secs),
        )
        .with_top_k(config.rag.top_k);

        Ok(Self::new(Arc::new(cache), engine))
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    pub fn engine(&self) -> &AnswerEngine {
        &self.engine
    }

    /// Load, chunk, embed and index `path`, or reuse the cached index for
    /// identical content.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn process(&self, path: impl AsRef<Path>) -> Result<IndexHandle> {
        let document = Document::open(path.as_ref()).await?;
        let key = self.cache.key_for(&document.fingerprint);
        let index = self.cache.get_or_build(&document).await?;

        Ok(IndexHandle {
            key: Some(key),
            origin: document.path,
            index,
        })
    }

    /// Open a persisted bundle directly, without its source document.
    ///
    /// With a configured embedding dimension, bundles of another dimension
    /// are rejected.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn open_bundle(&self, path: impl AsRef<Path>) -> Result<IndexHandle> {
        let path = path.as_ref();
        if !tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return Err(AppError::NotFound(path.to_path_buf()));
        }

        let loaded = match self.cache.embeddings().dimensions() {
            Some(expected) => VectorIndex::load_expecting(path, expected).await,
            None => VectorIndex::load(path).await,
        };
        let index = loaded
            .map_err(AppError::from)
            .map_err(|e| e.with_context(path.display()))?;

        Ok(IndexHandle {
            key: None,
            origin: path.to_path_buf(),
            index: Arc::new(index),
        })
    }

    pub async fn ask(&self, question: &str, handle: &IndexHandle) -> Result<String> {
        self.engine.answer(question, &handle.index).await
    }

    pub async fn ask_with_sources(&self, question: &str, handle: &IndexHandle) -> Result<Answer> {
        self.engine.answer_with_sources(question, &handle.index).await
    }
}

/// One user's conversation: the active document and the answered questions.
///
/// Each question is answered independently; the transcript is never fed
/// back into retrieval.
pub struct Session {
    askdoc: Arc<AskDoc>,
    active: Option<IndexHandle>,
    transcript: Vec<Exchange>,
}

impl Session {
    pub fn new(askdoc: Arc<AskDoc>) -> Self {
        Self {
            askdoc,
            active: None,
            transcript: Vec::new(),
        }
    }

    /// Process `path` and make it the active document. On failure the
    /// previous active document stays.
    pub async fn process(&mut self, path: impl AsRef<Path>) -> Result<&IndexHandle> {
        let handle = self.askdoc.process(path).await?;
        let active = self.active.insert(handle);
        Ok(&*active)
    }

    pub fn activate(&mut self, handle: IndexHandle) {
        self.active = Some(handle);
    }

    pub fn active(&self) -> Option<&IndexHandle> {
        self.active.as_ref()
    }

    /// Answer against the active document and record the exchange.
    /// Nothing is recorded when answering fails.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let handle = self.active.as_ref().ok_or(AppError::NotInitialized)?;
        let answer = self.askdoc.ask_with_sources(question, handle).await?;

        self.transcript.push(Exchange {
            question: question.to_string(),
            answer: answer.text.clone(),
            fingerprint: handle.id(),
            asked_at: Utc::now(),
        });
        Ok(answer)
    }

    pub fn transcript(&self) -> &[Exchange] {
        &self.transcript
    }

    pub fn transcript_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.transcript)
            .map_err(|e| AppError::Internal(format!("Failed to serialize transcript: {}", e)))
    }
}
