//! HTTP provider tests with mocked network responses
//!
//! These tests use wiremock to stand in for OpenAI-compatible embedding and
//! chat completion endpoints.

use askdoc::llm::openai::OpenAIClient;
use askdoc::llm::{LLMClient, Provider};
use askdoc::rag::answer::AnswerEngine;
use askdoc::rag::cache::DocumentCache;
use askdoc::rag::chunker::TextChunker;
use askdoc::rag::embeddings::{EmbeddingProvider, EmbeddingService, OpenAIEmbeddings};
use askdoc::utils::toml_config::ProviderKind;
use askdoc::{AppError, AskDoc};
use askdoc_index::IndexConfig;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

// ============= Helper Functions =============

fn embeddings_client(server: &MockServer) -> OpenAIEmbeddings {
    OpenAIEmbeddings::new(
        ProviderKind::OpenAI,
        Some("test-key".to_string()),
        &server.uri(),
        "text-embedding-3-small".to_string(),
        None,
        Duration::from_secs(5),
    )
    .unwrap()
}

fn chat_client(server: &MockServer) -> OpenAIClient {
    OpenAIClient::new(
        Some("test-key".to_string()),
        server.uri(),
        "gpt-4o-mini".to_string(),
        0.0,
        Duration::from_secs(5),
    )
    .unwrap()
}

fn mock_chat_response(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

/// Answers any embeddings request with one 3-d vector per input, derived
/// from the input length.
struct LengthEmbeddings;

impl Respond for LengthEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let inputs = body["input"].as_array().cloned().unwrap_or_default();
        let data: Vec<_> = inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                let len = input.as_str().map(str::len).unwrap_or(0) as f32;
                json!({ "object": "embedding", "index": index, "embedding": [len, 1.0, 0.5] })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "object": "list", "data": data }))
    }
}

// ============= Embeddings =============

#[tokio::test]
async fn test_embeddings_are_returned_in_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "text-embedding-3-small",
            "input": ["first", "second"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                { "object": "embedding", "index": 1, "embedding": [0.0, 1.0] },
                { "object": "embedding", "index": 0, "embedding": [1.0, 0.0] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vectors = embeddings_client(&server)
        .embed_batch(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test]
async fn test_embeddings_error_status_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let result = embeddings_client(&server)
        .embed_batch(&["text".to_string()])
        .await;

    match result {
        Err(AppError::EmbeddingService(msg)) => {
            assert!(msg.contains("429"));
            assert!(msg.contains("rate limited"));
        }
        other => panic!("Expected EmbeddingService error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_embeddings_count_mismatch_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [1.0] }]
        })))
        .mount(&server)
        .await;

    let result = embeddings_client(&server)
        .embed_batch(&["a".to_string(), "b".to_string()])
        .await;
    assert!(matches!(result, Err(AppError::EmbeddingService(_))));
}

#[tokio::test]
async fn test_embeddings_malformed_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let result = embeddings_client(&server)
        .embed_batch(&["a".to_string()])
        .await;
    assert!(matches!(result, Err(AppError::EmbeddingService(msg)) if msg.contains("Malformed")));
}

#[tokio::test]
async fn test_gateway_splits_large_inputs_into_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(LengthEmbeddings)
        .expect(3)
        .mount(&server)
        .await;

    let service = EmbeddingService::new(
        Arc::new(embeddings_client(&server)),
        Duration::from_secs(5),
    )
    .with_batch_size(2);
    let texts: Vec<String> = (0..5).map(|i| "x".repeat(i + 1)).collect();

    let vectors = service.embed_batch(&texts).await.unwrap();
    let lengths: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
    assert_eq!(lengths, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
}

#[tokio::test]
async fn test_gateway_times_out_hung_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": [{ "index": 0, "embedding": [1.0, 0.0] }] }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let service = EmbeddingService::new(
        Arc::new(embeddings_client(&server)),
        Duration::from_millis(200),
    );
    let result = service.embed("hello").await;
    assert!(matches!(result, Err(AppError::EmbeddingService(msg)) if msg.contains("timed out")));
}

// ============= Chat completions =============

#[tokio::test]
async fn test_chat_completion_returns_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [{ "role": "user", "content": "Hello" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_chat_response("Hi there")))
        .expect(1)
        .mount(&server)
        .await;

    let answer = chat_client(&server).generate("Hello").await.unwrap();
    assert_eq!(answer, "Hi there");
}

#[tokio::test]
async fn test_chat_server_error_is_answer_engine_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = chat_client(&server).generate("Hello").await;
    assert!(matches!(result, Err(AppError::AnswerEngine(msg)) if msg.contains("500")));
}

#[tokio::test]
async fn test_chat_without_choices_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let result = chat_client(&server).generate("Hello").await;
    assert!(matches!(result, Err(AppError::AnswerEngine(_))));
}

#[tokio::test]
async fn test_ollama_provider_uses_v1_endpoint_without_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_chat_response("local")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Provider::Ollama {
        base_url: server.uri(),
        model: "llama3.2".to_string(),
        temperature: 0.0,
        timeout: Duration::from_secs(5),
    };
    let client = provider.create_client().unwrap();

    assert_eq!(client.generate("Hello").await.unwrap(), "local");
    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

// ============= End to end =============

#[tokio::test]
async fn test_process_and_ask_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(LengthEmbeddings)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_chat_response("Forty two.")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let document = dir.path().join("answers.txt");
    std::fs::write(&document, "The answer to everything is forty two.\n").unwrap();

    let embeddings = EmbeddingService::new(
        Arc::new(embeddings_client(&server)),
        Duration::from_secs(5),
    );
    let cache = DocumentCache::new(
        TextChunker::new(200, 20).unwrap(),
        embeddings.clone(),
        IndexConfig::default(),
    )
    .with_index_dir(dir.path().join("indexes"));
    let engine = AnswerEngine::new(embeddings, Arc::new(chat_client(&server)), Duration::from_secs(5));
    let askdoc = AskDoc::new(Arc::new(cache), engine);

    let handle = askdoc.process(&document).await.unwrap();
    let answer = askdoc.ask("What is the answer?", &handle).await.unwrap();

    assert_eq!(answer, "Forty two.");
    assert_eq!(handle.index.len(), 1);
    assert!(askdoc
        .cache()
        .bundle_path(handle.key.as_ref().unwrap())
        .unwrap()
        .exists());
}
