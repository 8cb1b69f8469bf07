//! Model client for OpenAI-compatible chat-completion endpoints
//!
//! `ModelClient` is the one seam between the evaluation runners and a
//! language model. `ChatClient` speaks the chat-completions wire format
//! over reqwest (OpenRouter by default); tests substitute in-process fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skillbench_types::{
    ChatMessage, CompletionRequest, CompletionResponse, InferenceError, Tool, ToolCall, Usage,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default endpoint base
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Anything that can answer a chat-completion request
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Run one completion
    async fn complete(&self, request: CompletionRequest)
        -> Result<CompletionResponse, InferenceError>;
}

/// Connection settings for [`ChatClient`]
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub base_url: String,
    pub api_key: String,
    /// Transport-level timeout; the runners apply their own per-call deadline
    pub timeout_secs: u64,
    /// Sent as `X-Title`, used by OpenRouter for attribution
    pub app_name: Option<String>,
}

impl ChatClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout_secs: 300,
            app_name: Some("skillbench".to_string()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Chat-completions client
pub struct ChatClient {
    client: reqwest::Client,
    config: ChatClientConfig,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [Tool],
}

fn no_tools(tools: &&[Tool]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireErrorResponse {
    error: Option<WireErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: Option<String>,
}

impl ChatClient {
    /// Create a new client
    pub fn new(config: ChatClientConfig) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        info!("Model client initialized for {}", config.base_url);
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn map_http_error(status: u16, body_text: &str) -> InferenceError {
        let message = serde_json::from_str::<WireErrorResponse>(body_text)
            .ok()
            .and_then(|r| r.error)
            .and_then(|d| d.message)
            .unwrap_or_else(|| body_text.to_string());

        match status {
            401 | 403 => InferenceError::Auth {
                status,
                body: message,
            },
            _ => InferenceError::Status {
                status,
                body: message,
            },
        }
    }
}

/// Turn a decoded body into a response; a body without choices is an error
fn into_completion(wire: WireResponse) -> Result<CompletionResponse, InferenceError> {
    let usage = wire.usage.unwrap_or_default();
    let choice = wire
        .choices
        .into_iter()
        .next()
        .ok_or(InferenceError::EmptyResponse)?;

    Ok(CompletionResponse {
        content: choice.message.content,
        tool_calls: choice.message.tool_calls.unwrap_or_default(),
        finish_reason: choice.finish_reason.unwrap_or_default(),
        usage,
    })
}

#[async_trait]
impl ModelClient for ChatClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, InferenceError> {
        let body = WireRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            tools: &request.tools,
        };

        debug!(
            "Sending {} messages ({} tools) to {}",
            request.messages.len(),
            request.tools.len(),
            request.model
        );

        let mut builder = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body);
        if let Some(app_name) = &self.config.app_name {
            builder = builder.header("X-Title", app_name);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    secs: self.config.timeout_secs,
                }
            } else {
                InferenceError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| InferenceError::Transport(format!("failed to read response body: {}", e)))?;

        if !(200..300).contains(&status) {
            warn!("{} returned HTTP {}", request.model, status);
            return Err(Self::map_http_error(status, &text));
        }

        let wire: WireResponse =
            serde_json::from_str(&text).map_err(|e| InferenceError::Decode(e.to_string()))?;
        let completion = into_completion(wire)?;

        debug!(
            "{} answered ({} prompt / {} completion tokens, {} tool calls)",
            request.model,
            completion.usage.prompt_tokens,
            completion.usage.completion_tokens,
            completion.tool_calls.len()
        );
        Ok(completion)
    }
}
