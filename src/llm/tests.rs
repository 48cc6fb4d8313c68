use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::config::LlmConfig;

fn test_config() -> LlmConfig {
    LlmConfig::default()
}

#[test]
fn provider_selector_parsing() {
    assert_eq!(
        "openai".parse::<LlmProvider>().expect("should parse"),
        LlmProvider::OpenAi
    );
    assert_eq!(
        "openrouter".parse::<LlmProvider>().expect("should parse"),
        LlmProvider::OpenRouter
    );

    let result = "acme-llm".parse::<LlmProvider>();
    assert!(matches!(result, Err(AgentError::UnsupportedProvider(_))));
}

#[test]
fn provider_profiles() {
    assert_eq!(LlmProvider::OpenAi.api_key_env(), "OPENAI_API_KEY");
    assert_eq!(LlmProvider::OpenRouter.api_key_env(), "OPENROUTER_API_KEY");
    assert!(LlmProvider::OpenAi.api_base().contains("api.openai.com"));
    assert!(LlmProvider::OpenRouter.api_base().contains("openrouter.ai"));
}

#[test]
fn missing_credential_is_an_authentication_error() {
    let result =
        OpenAiChatClient::with_api_key(LlmProvider::OpenAi, &test_config(), String::new());
    assert!(matches!(result, Err(AgentError::Authentication(_))));
}

#[test]
fn model_defaults_per_provider() {
    let client =
        OpenAiChatClient::with_api_key(LlmProvider::OpenAi, &test_config(), "sk-test".to_string())
            .expect("should create client");
    assert_eq!(client.model(), DEFAULT_OPENAI_MODEL);

    let client = OpenAiChatClient::with_api_key(
        LlmProvider::OpenRouter,
        &test_config(),
        "sk-test".to_string(),
    )
    .expect("should create client");
    assert_eq!(client.model(), "anthropic/claude-3-sonnet");

    let mut config = test_config();
    config.model = Some("gpt-4o".to_string());
    let client = OpenAiChatClient::with_api_key(LlmProvider::OpenAi, &config, "sk-test".to_string())
        .expect("should create client");
    assert_eq!(client.model(), "gpt-4o");
}

#[test]
fn chat_messages_serialize_without_empty_fields() {
    let message = ChatMessage::user("hello");
    let value = serde_json::to_value(&message).expect("should serialize");

    assert_eq!(value, json!({ "role": "user", "content": "hello" }));

    let message = ChatMessage::tool_result("call_1", "tool output");
    let value = serde_json::to_value(&message).expect("should serialize");

    assert_eq!(
        value,
        json!({ "role": "tool", "content": "tool output", "tool_call_id": "call_1" })
    );
}

#[test]
fn tool_specs_serialize_in_function_calling_format() {
    let spec = ToolSpec {
        name: "document_search".to_string(),
        description: "Search documents".to_string(),
        parameters: json!({ "type": "object" }),
    };
    let request = ChatRequest {
        model: "gpt-4o-mini",
        messages: &[ChatMessage::user("hi")],
        temperature: 0.0,
        tools: vec![WireTool {
            tool_type: "function",
            function: &spec,
        }],
    };

    let value = serde_json::to_value(&request).expect("should serialize");

    assert_eq!(value["tools"][0]["type"], "function");
    assert_eq!(value["tools"][0]["function"]["name"], "document_search");
    assert_eq!(value["model"], "gpt-4o-mini");
}

#[test]
fn parses_a_tool_call_response() {
    let body = json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "document_search",
                        "arguments": "{\"query\":\"sky color\"}"
                    }
                }]
            },
            "finish_reason": "tool_calls"
        }]
    });

    let response: ChatResponse =
        serde_json::from_value(body).expect("should parse tool call response");
    let message = &response.choices[0].message;

    assert_eq!(message.content, None);
    let calls = message.tool_calls.as_ref().expect("should have tool calls");
    assert_eq!(calls[0].function.name, "document_search");
    assert_eq!(calls[0].function.arguments, "{\"query\":\"sky color\"}");
}

#[tokio::test(flavor = "multi_thread")]
async fn completes_against_a_mock_gateway() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "The sky is blue." },
                "finish_reason": "stop"
            }]
        })))
        .mount(&server)
        .await;

    let base_url = Url::parse(&server.uri()).expect("should parse mock server URL");
    let client =
        OpenAiChatClient::with_api_key(LlmProvider::OpenAi, &test_config(), "sk-test".to_string())
            .expect("should create client")
            .with_base_url(base_url);

    let transcript = vec![ChatMessage::user("What color is the sky?")];
    let reply = tokio::task::spawn_blocking(move || client.complete(&transcript, &[]))
        .await
        .expect("blocking task should not panic")
        .expect("should complete");

    assert_eq!(reply.content.as_deref(), Some("The sky is blue."));
    assert!(reply.tool_calls.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_choices_is_a_model_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "x", "choices": [] })),
        )
        .mount(&server)
        .await;

    let base_url = Url::parse(&server.uri()).expect("should parse mock server URL");
    let client =
        OpenAiChatClient::with_api_key(LlmProvider::OpenAi, &test_config(), "sk-test".to_string())
            .expect("should create client")
            .with_base_url(base_url);

    let transcript = vec![ChatMessage::user("hello")];
    let result = tokio::task::spawn_blocking(move || client.complete(&transcript, &[]))
        .await
        .expect("blocking task should not panic");

    assert!(matches!(result, Err(AgentError::Model(_))));
}
