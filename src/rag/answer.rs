//! Retrieval-augmented answering.
//!
//! A question is embedded, the closest chunks are pulled from the index, and
//! the language model answers from a fixed prompt built around them.

use askdoc_index::{SearchHit, VectorIndex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use crate::llm::LLMClient;
use crate::rag::embeddings::EmbeddingService;
use crate::types::{AppError, Result};

/// Chunks retrieved per question unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 4;

/// Model output together with the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchHit>,
}

/// Embeds questions, retrieves context and calls the language model.
#[derive(Clone)]
pub struct AnswerEngine {
    embeddings: EmbeddingService,
    llm: Arc<dyn LLMClient>,
    top_k: usize,
    timeout: Duration,
}

impl AnswerEngine {
    pub fn new(embeddings: EmbeddingService, llm: Arc<dyn LLMClient>, timeout: Duration) -> Self {
        Self {
            embeddings,
            llm,
            top_k: DEFAULT_TOP_K,
            timeout,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Answer `question` from `index`, returning the raw model output.
    pub async fn answer(&self, question: &str, index: &VectorIndex) -> Result<String> {
        self.answer_with_sources(question, index)
            .await
            .map(|answer| answer.text)
    }

    /// Like [`answer`](Self::answer), but also returns the retrieved chunks.
    ///
    /// An empty index yields an empty context; the prompt then tells the
    /// model to fall back on general knowledge.
    #[instrument(skip(self, index), fields(top_k = self.top_k, entries = index.len()))]
    pub async fn answer_with_sources(&self, question: &str, index: &VectorIndex) -> Result<Answer> {
        let started = Instant::now();

        let sources = if index.is_empty() {
            Vec::new()
        } else {
            let query = self
                .embeddings
                .embed(question)
                .await
                .map_err(|e| e.with_context(format!("question {:?}", question)))?;
            index
                .search(&query, self.top_k)
                .map_err(AppError::from)
                .map_err(|e| e.with_context(format!("question {:?}", question)))?
        };

        let context = sources
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = build_prompt(&context, question);

        let text = tokio::time::timeout(self.timeout, self.llm.generate(&prompt))
            .await
            .map_err(|_| {
                AppError::AnswerEngine(format!(
                    "Language model timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            })?
            .map_err(into_answer_error)?;

        debug!(
            retrieved = sources.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Answered question"
        );
        Ok(Answer { text, sources })
    }
}

/// Fill the instruction template with retrieved context and the question.
///
/// Both are inserted verbatim in a single pass, so placeholder-like text in a
/// chunk is never substituted.
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an AI assistant. Use the following pieces of context to answer the user's question.\n\
         If no context is available, answer politely using your general knowledge.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         \n\
         Only provide the helpful answer below.\n\
         Answer:"
    )
}

fn into_answer_error(err: AppError) -> AppError {
    match err {
        AppError::AnswerEngine(_) => err,
        other => AppError::AnswerEngine(other.to_string()),
    }
}
