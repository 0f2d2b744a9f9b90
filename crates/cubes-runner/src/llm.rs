//! Inference backend abstraction and implementations.
//!
//! Planner and synthesis only see the [`Inference`] trait: a request of
//! `{model, messages}` in, completion text (or a typed failure) out. The
//! production implementation is [`LlmBackend`], an enum over the concrete
//! HTTP backends. Enum dispatch keeps the async call free of trait objects.
//!
//! Every backend funnels its response body through
//! [`extract`](crate::extract), so the text can be found regardless of
//! which wrapper shape the runtime uses.

use std::future::Future;

use serde::Serialize;
use serde_json::Value;

use crate::config::{BackendType, LlmBackendConfig};
use crate::error::RunnerError;
use crate::extract::{extract_from_body, extract_text};
use crate::prompt::RenderedPrompt;

// ---------------------------------------------------------------------------
// Request shape
// ---------------------------------------------------------------------------

/// Author of one chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions.
    System,
    /// The prompt itself.
    User,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Author.
    pub role: Role,
    /// Text.
    pub content: String,
}

/// An inference call: which model, and the conversation to complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InferenceRequest {
    /// Model identifier.
    pub model: String,
    /// System message followed by the user message.
    pub messages: Vec<ChatMessage>,
}

impl InferenceRequest {
    /// A `[system, user]` request for `model`.
    pub fn new(model: impl Into<String>, prompt: RenderedPrompt) -> Self {
        Self {
            model: model.into(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: prompt.system,
                },
                ChatMessage {
                    role: Role::User,
                    content: prompt.user,
                },
            ],
        }
    }

    /// The system message, or empty.
    pub fn system(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map_or("", |m| m.content.as_str())
    }

    /// Non-system messages, for APIs that take the system prompt separately.
    pub fn conversation(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }
}

// ---------------------------------------------------------------------------
// Collaborator interface
// ---------------------------------------------------------------------------

/// Text completion service.
///
/// Failures are values: the caller decides whether a failed call means
/// "no decision this tick" or something worse.
pub trait Inference: Send + Sync {
    /// Complete `request` and return the plain response text.
    fn infer(
        &self,
        request: &InferenceRequest,
    ) -> impl Future<Output = Result<String, RunnerError>> + Send;
}

// ---------------------------------------------------------------------------
// Unified backend enum
// ---------------------------------------------------------------------------

/// An HTTP inference backend.
pub enum LlmBackend {
    /// `OpenAI`-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
    /// Local proxy in front of a model runtime.
    Proxy(ProxyBackend),
}

impl LlmBackend {
    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
            Self::Proxy(_) => "proxy",
        }
    }
}

impl Inference for LlmBackend {
    async fn infer(&self, request: &InferenceRequest) -> Result<String, RunnerError> {
        match self {
            Self::OpenAi(backend) => backend.complete(request).await,
            Self::Anthropic(backend) => backend.complete(request).await,
            Self::Proxy(backend) => backend.complete(request).await,
        }
    }
}

/// Create an inference backend from configuration.
///
/// # Errors
///
/// Returns [`RunnerError::Config`] if the HTTP client cannot be built.
pub fn create_backend(config: &LlmBackendConfig) -> Result<LlmBackend, RunnerError> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| RunnerError::Config(format!("failed to build HTTP client: {e}")))?;
    let endpoint = Endpoint {
        client,
        api_url: config.api_url.clone(),
        api_key: config.api_key.clone(),
    };
    Ok(match config.backend_type {
        BackendType::OpenAi => LlmBackend::OpenAi(OpenAiBackend { endpoint }),
        BackendType::Anthropic => LlmBackend::Anthropic(AnthropicBackend { endpoint }),
        BackendType::Proxy => LlmBackend::Proxy(ProxyBackend { endpoint }),
    })
}

/// Connection details shared by every backend.
struct Endpoint {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

/// Send a request and return the body of a successful response.
async fn send(request: reqwest::RequestBuilder, label: &str) -> Result<String, RunnerError> {
    let response = request
        .send()
        .await
        .map_err(|e| RunnerError::LlmBackend(format!("{label} request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        return Err(RunnerError::LlmBackend(format!(
            "{label} returned {status}: {error_body}"
        )));
    }

    response
        .text()
        .await
        .map_err(|e| RunnerError::LlmBackend(format!("{label} body read failed: {e}")))
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for `OpenAI`-compatible chat completions APIs.
///
/// Works with `OpenAI`, `DeepSeek`, and Ollama endpoints.
/// Sends requests to `{api_url}/chat/completions`.
pub struct OpenAiBackend {
    endpoint: Endpoint,
}

impl OpenAiBackend {
    async fn complete(&self, request: &InferenceRequest) -> Result<String, RunnerError> {
        let url = format!("{}/chat/completions", self.endpoint.api_url);
        let body = serde_json::json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": 0.7,
            "max_tokens": 512,
            "response_format": {"type": "json_object"}
        });

        let mut builder = self.endpoint.client.post(&url).json(&body);
        if !self.endpoint.api_key.is_empty() {
            builder = builder.bearer_auth(&self.endpoint.api_key);
        }
        let text = send(builder, "OpenAI").await?;
        let json: Value = serde_json::from_str(&text)
            .map_err(|e| RunnerError::LlmBackend(format!("OpenAI response parse failed: {e}")))?;
        extract_text(&json)
    }
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// The system prompt is a top-level field rather than a message, auth goes
/// in `x-api-key`, and the text comes back in `content[0].text`.
pub struct AnthropicBackend {
    endpoint: Endpoint,
}

impl AnthropicBackend {
    async fn complete(&self, request: &InferenceRequest) -> Result<String, RunnerError> {
        let url = format!("{}/messages", self.endpoint.api_url);
        let messages: Vec<&ChatMessage> = request.conversation().collect();
        let body = serde_json::json!({
            "model": request.model,
            "max_tokens": 512,
            "system": request.system(),
            "messages": messages
        });

        let builder = self
            .endpoint
            .client
            .post(&url)
            .header("x-api-key", &self.endpoint.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body);
        let text = send(builder, "Anthropic").await?;
        let json: Value = serde_json::from_str(&text).map_err(|e| {
            RunnerError::LlmBackend(format!("Anthropic response parse failed: {e}"))
        })?;
        extract_text(&json)
    }
}

// ---------------------------------------------------------------------------
// Local proxy backend
// ---------------------------------------------------------------------------

/// Backend for the local inference proxy.
///
/// Posts the request as-is to `api_url` and accepts any of the known
/// response shapes, including a bare text body.
pub struct ProxyBackend {
    endpoint: Endpoint,
}

impl ProxyBackend {
    async fn complete(&self, request: &InferenceRequest) -> Result<String, RunnerError> {
        let mut builder = self.endpoint.client.post(&self.endpoint.api_url).json(request);
        if !self.endpoint.api_key.is_empty() {
            builder = builder.bearer_auth(&self.endpoint.api_key);
        }
        let text = send(builder, "proxy").await?;
        extract_from_body(text)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn prompt() -> RenderedPrompt {
        RenderedPrompt {
            system: "Respond in JSON.".to_owned(),
            user: "What now?".to_owned(),
        }
    }

    #[test]
    fn request_serializes_as_chat_messages() {
        let request = InferenceRequest::new("llama3.2:3b", prompt());
        let json = serde_json::to_value(&request).unwrap_or_default();
        let at = |path: &str| json.pointer(path).and_then(Value::as_str).map(ToOwned::to_owned);
        assert_eq!(at("/model").as_deref(), Some("llama3.2:3b"));
        assert_eq!(at("/messages/0/role").as_deref(), Some("system"));
        assert_eq!(at("/messages/1/role").as_deref(), Some("user"));
        assert_eq!(at("/messages/1/content").as_deref(), Some("What now?"));
    }

    #[test]
    fn system_is_split_out_for_anthropic() {
        let request = InferenceRequest::new("m", prompt());
        assert_eq!(request.system(), "Respond in JSON.");
        let rest: Vec<&ChatMessage> = request.conversation().collect();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest.first().map(|m| m.role), Some(Role::User));
    }

    #[test]
    fn create_backend_dispatches_correctly() {
        for (backend_type, name) in [
            (BackendType::OpenAi, "openai-compatible"),
            (BackendType::Anthropic, "anthropic"),
            (BackendType::Proxy, "proxy"),
        ] {
            let config = LlmBackendConfig {
                backend_type,
                api_url: "http://127.0.0.1:9".to_owned(),
                api_key: String::new(),
                timeout: Duration::from_secs(1),
            };
            let backend = create_backend(&config);
            assert_eq!(backend.as_ref().map(LlmBackend::name).ok(), Some(name));
        }
    }
}
