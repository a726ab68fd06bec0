//! Gemini adapters against a mock Generative Language API

use ragline::embedding::{
    EmbeddingError, EmbeddingProvider, GeminiEmbeddingConfig, GeminiEmbeddingProvider,
    GEMINI_MAX_BATCH_REQUESTS,
};
use ragline::generation::{GeminiGenerator, GeminiGeneratorConfig, GenerationError, TextGenerator};
use ragline::retrieval::{PipelineError, PipelineOptions, PromptTemplate, RetrievalPipeline};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const EMBED_PATH: &str = "/v1beta/models/text-embedding-004:embedContent";
const BATCH_PATH: &str = "/v1beta/models/text-embedding-004:batchEmbedContents";
const GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-pro:generateContent";

fn embedding_config(server: &MockServer) -> GeminiEmbeddingConfig {
    GeminiEmbeddingConfig {
        dimension: 3,
        base_url: server.uri(),
        ..GeminiEmbeddingConfig::new("test-key")
    }
}

fn embedder(server: &MockServer) -> GeminiEmbeddingProvider {
    GeminiEmbeddingProvider::new(embedding_config(server)).unwrap()
}

#[tokio::test]
async fn test_embed_single_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "model": "models/text-embedding-004",
            "content": {"parts": [{"text": "Delivery was slow."}]},
            "taskType": "SEMANTIC_SIMILARITY"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"embedding": {"values": [0.1, 0.2, 0.3]}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let vector = embedder(&server).embed("Delivery was slow.").await.unwrap();
    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn test_embed_batch_keeps_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .and(body_partial_json(json!({
            "requests": [
                {"content": {"parts": [{"text": "first"}]}},
                {"content": {"parts": [{"text": "second"}]}}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [
                {"values": [1.0, 0.0, 0.0]},
                {"values": [0.0, 1.0, 0.0]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vectors = embedder(&server)
        .embed_batch(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
}

/// Answers a batch request with one embedding per request, first value = request position
struct CountingBatchResponder;

impl Respond for CountingBatchResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        let count = body["requests"].as_array().map(Vec::len).unwrap_or(0);
        let embeddings: Vec<_> = (0..count)
            .map(|i| json!({"values": [i as f32, 0.0, 0.0]}))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
    }
}

#[tokio::test]
async fn test_large_batch_is_split() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(CountingBatchResponder)
        .expect(2)
        .mount(&server)
        .await;

    let texts: Vec<String> = (0..GEMINI_MAX_BATCH_REQUESTS + 50)
        .map(|i| format!("text {i}"))
        .collect();
    let vectors = embedder(&server).embed_batch(&texts).await.unwrap();

    assert_eq!(vectors.len(), texts.len());
    assert_eq!(vectors[0][0], 0.0);
    assert_eq!(vectors[GEMINI_MAX_BATCH_REQUESTS - 1][0], 99.0);
    assert_eq!(vectors[GEMINI_MAX_BATCH_REQUESTS][0], 0.0);
    assert_eq!(vectors[texts.len() - 1][0], 49.0);
}

#[tokio::test]
async fn test_api_error_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "message": "quota exceeded", "status": "RESOURCE_EXHAUSTED"}
        })))
        .mount(&server)
        .await;

    match embedder(&server).embed("anything").await {
        Err(EmbeddingError::ProviderError { provider, message }) => {
            assert_eq!(provider, "gemini");
            assert!(message.contains("quota exceeded"), "{message}");
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_wrong_dimension_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embedding": {"values": [0.1, 0.2]}})),
        )
        .mount(&server)
        .await;

    assert!(matches!(
        embedder(&server).embed("anything").await,
        Err(EmbeddingError::DimensionMismatch {
            expected: 3,
            actual: 2
        })
    ));
}

#[tokio::test]
async fn test_empty_text_never_reaches_the_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    assert!(matches!(
        embedder(&server).embed("  ").await,
        Err(EmbeddingError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_generator_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "API key not valid"}
        })))
        .mount(&server)
        .await;

    let generator = GeminiGenerator::new(GeminiGeneratorConfig {
        base_url: server.uri(),
        ..GeminiGeneratorConfig::new("test-key")
    })
    .unwrap();

    match generator.generate("prompt").await {
        Err(GenerationError::ProviderError { message, .. }) => {
            assert!(message.contains("API key not valid"), "{message}");
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ask_end_to_end() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [
                {"values": [1.0, 0.0, 0.0]},
                {"values": [0.0, 1.0, 0.0]},
                {"values": [0.0, 0.0, 1.0]},
                {"values": [0.9, 0.1, 0.0]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"embedding": {"values": [1.0, 0.05, 0.0]}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_string_contains(
            "Shipping took more than a week and caused delays.",
        ))
        .and(body_partial_json(json!({
            "contents": [{"role": "user"}],
            "generationConfig": {"temperature": 0.1}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "Deliveries are slow and delayed."}]}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = Arc::new(embedder(&server));
    let mut pipeline = RetrievalPipeline::new(provider, PipelineOptions::default());
    pipeline
        .build([
            "Delivery was slow and took many days.",
            "The product quality is excellent.",
            "Customer support responded quickly.",
            "Shipping took more than a week and caused delays.",
        ])
        .await
        .unwrap();

    let generator = GeminiGenerator::new(GeminiGeneratorConfig::from_embedding(
        &embedding_config(&server),
        "gemini-2.0-pro",
    ))
    .unwrap();

    let answer = pipeline
        .ask(
            "What issues are customers facing?",
            2,
            &generator,
            &PromptTemplate::default(),
        )
        .await
        .unwrap();

    assert_eq!(answer.text, "Deliveries are slow and delayed.");
    assert_eq!(answer.context.ids(), vec![0, 3]);
}

#[tokio::test]
async fn test_build_failure_from_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let mut pipeline =
        RetrievalPipeline::new(Arc::new(embedder(&server)), PipelineOptions::default());
    let result = pipeline.build(["one", "two"]).await;

    assert!(matches!(result, Err(PipelineError::Provider(_))));
    assert!(!pipeline.is_built());
}
