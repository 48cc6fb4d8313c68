use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;

fn test_config() -> EmbeddingConfig {
    EmbeddingConfig {
        model: "text-embedding-3-small".to_string(),
        batch_size: 2,
    }
}

#[test]
fn missing_credential_is_an_authentication_error() {
    let result = OpenAiEmbedder::with_api_key(&test_config(), String::new());
    assert!(matches!(result, Err(AgentError::Authentication(_))));

    let result = OpenAiEmbedder::with_api_key(&test_config(), "   ".to_string());
    assert!(matches!(result, Err(AgentError::Authentication(_))));
}

#[test]
fn client_configuration() {
    let client = OpenAiEmbedder::with_api_key(&test_config(), "sk-test".to_string())
        .expect("should create client");

    assert_eq!(client.model, "text-embedding-3-small");
    assert_eq!(client.batch_size, 2);
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn empty_batch_needs_no_network() {
    let client = OpenAiEmbedder::with_api_key(&test_config(), "sk-test".to_string())
        .expect("should create client");

    let vectors = client.embed_batch(&[]).expect("should embed empty batch");
    assert!(vectors.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn embeds_texts_and_restores_input_order() {
    let server = MockServer::start().await;

    // Vectors returned out of order; the client must reorder by index.
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("Authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "model": "text-embedding-3-small",
            "data": [
                { "object": "embedding", "index": 1, "embedding": [0.0, 1.0] },
                { "object": "embedding", "index": 0, "embedding": [1.0, 0.0] },
            ]
        })))
        .mount(&server)
        .await;

    let base_url = Url::parse(&server.uri()).expect("should parse mock server URL");
    let client = OpenAiEmbedder::with_api_key(&test_config(), "sk-test".to_string())
        .expect("should create client")
        .with_base_url(base_url);

    let texts = vec!["first".to_string(), "second".to_string()];
    let vectors = tokio::task::spawn_blocking(move || client.embed_batch(&texts))
        .await
        .expect("blocking task should not panic")
        .expect("should embed batch");

    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let base_url = Url::parse(&server.uri()).expect("should parse mock server URL");
    let client = OpenAiEmbedder::with_api_key(&test_config(), "sk-bad".to_string())
        .expect("should create client")
        .with_base_url(base_url)
        .with_retry_attempts(3);

    let result = tokio::task::spawn_blocking(move || client.embed("hello"))
        .await
        .expect("blocking task should not panic");

    assert!(matches!(result, Err(AgentError::Embedding(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn count_mismatch_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "model": "text-embedding-3-small",
            "data": []
        })))
        .mount(&server)
        .await;

    let base_url = Url::parse(&server.uri()).expect("should parse mock server URL");
    let client = OpenAiEmbedder::with_api_key(&test_config(), "sk-test".to_string())
        .expect("should create client")
        .with_base_url(base_url);

    let result = tokio::task::spawn_blocking(move || client.embed("hello"))
        .await
        .expect("blocking task should not panic");

    assert!(matches!(result, Err(AgentError::Embedding(_))));
}
