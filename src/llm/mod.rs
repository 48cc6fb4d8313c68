#[cfg(test)]
mod tests;

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::LlmConfig;
use crate::{AgentError, Result};

const DEFAULT_TIMEOUT_SECONDS: u64 = 120;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1/";
pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1/";

/// Supported chat-completion gateways. Both speak the same wire protocol
/// and differ only in endpoint, credential, and default model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    OpenRouter,
}

impl LlmProvider {
    #[inline]
    pub fn api_base(self) -> &'static str {
        match self {
            Self::OpenAi => OPENAI_API_BASE,
            Self::OpenRouter => OPENROUTER_API_BASE,
        }
    }

    /// Environment variable holding this provider's credential.
    #[inline]
    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = AgentError;

    #[inline]
    fn from_str(selector: &str) -> Result<Self> {
        match selector {
            "openai" => Ok(Self::OpenAi),
            "openrouter" => Ok(Self::OpenRouter),
            other => Err(AgentError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry in a query's transcript, in chat-completions wire format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Assistant turn that requested tool calls, echoed back verbatim so
    /// the model can see its own request preceding the tool result.
    #[inline]
    pub fn assistant_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    #[inline]
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A tool-call request exactly as the model produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, unparsed; malformed content is the agent
    /// loop's problem, not the wire layer's
    pub arguments: String,
}

/// A tool made available to the model.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One model reply: a final answer, tool-call requests, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

/// External language-model capability consumed by the agent loop.
pub trait LanguageModel: Send + Sync {
    /// Send the transcript and available tools, returning the model's next
    /// reply.
    fn complete(&self, transcript: &[ChatMessage], tools: &[ToolSpec]) -> Result<AssistantReply>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: &'a ToolSpec,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallRequest>>,
}

/// Chat-completions client for OpenAI-compatible gateways.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    base_url: Url,
    api_key: String,
    model: String,
    agent: ureq::Agent,
    retry_attempts: u32,
}

impl OpenAiChatClient {
    /// Create a client for the given provider, taking the credential from
    /// the provider's environment variable.
    #[inline]
    pub fn new(provider: LlmProvider, config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(provider.api_key_env()).unwrap_or_default();
        Self::with_api_key(provider, config, api_key)
    }

    #[inline]
    pub fn with_api_key(provider: LlmProvider, config: &LlmConfig, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AgentError::Authentication(format!(
                "{} not found in environment variables",
                provider.api_key_env()
            )));
        }

        let model = config.model.clone().unwrap_or_else(|| match provider {
            LlmProvider::OpenAi => DEFAULT_OPENAI_MODEL.to_string(),
            LlmProvider::OpenRouter => config.openrouter_model.clone(),
        });

        let base_url = Url::parse(provider.api_base())
            .map_err(|e| AgentError::Model(format!("Invalid API base URL: {}", e)))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            api_key,
            model,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    /// Point the client at a different API base, e.g. a mock server.
    #[inline]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => return Ok(response_text),
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                return Err(AgentError::Model(format!(
                                    "Chat API returned HTTP {}",
                                    status
                                )));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => false,
                    };

                    if !should_retry {
                        return Err(AgentError::Model(format!("Non-retryable error: {}", error)));
                    }

                    last_error = Some(AgentError::Model(format!("Request error: {}", error)));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        debug!("Waiting {}ms before retry", delay_ms);
                        std::thread::sleep(Duration::from_millis(delay_ms));
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.base_url);

        Err(last_error.unwrap_or_else(|| AgentError::Model("Request failed after retries".to_string())))
    }
}

impl LanguageModel for OpenAiChatClient {
    #[inline]
    fn complete(&self, transcript: &[ChatMessage], tools: &[ToolSpec]) -> Result<AssistantReply> {
        let request = ChatRequest {
            model: &self.model,
            messages: transcript,
            temperature: 0.0,
            tools: tools
                .iter()
                .map(|tool| WireTool {
                    tool_type: "function",
                    function: tool,
                })
                .collect(),
        };

        let url = self
            .base_url
            .join("chat/completions")
            .map_err(|e| AgentError::Model(format!("Failed to build completions URL: {}", e)))?;

        let request_json = serde_json::to_string(&request)
            .map_err(|e| AgentError::Model(format!("Failed to serialize request: {}", e)))?;

        debug!(
            "Requesting completion from {} ({} transcript entries)",
            url,
            transcript.len()
        );

        let response_text = self.make_request_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .header("Authorization", &format!("Bearer {}", self.api_key))
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| AgentError::Model(format!("Failed to parse response: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Model("No choices in response".to_string()))?;

        Ok(AssistantReply {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
        })
    }
}
