//! Chat-completion client abstraction and the OpenAI-compatible HTTP adapter.
//!
//! Both request handlers talk to the language model through [`CompletionClient`]. The production
//! adapter issues a single `POST /v1/chat/completions` per call; there are no retries and no
//! client-side timeout, so failures surface to the caller exactly once.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A single chat message forwarded verbatim to the provider.
///
/// Only `role` and `content` are required by providers; any extra keys the client sent are kept.
pub type ChatMessage = Map<String, Value>;

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Provider could not be reached.
    #[error("Completion provider unavailable: {0}")]
    Unavailable(String),
    /// Provider answered with a non-success status (auth, quota, bad request, ...).
    #[error("Completion provider returned {status}: {message}")]
    Rejected {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Provider-supplied error message, or the raw body when none was structured.
        message: String,
    },
    /// Provider response could not be decoded.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Request payload passed to the completion provider.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Ordered conversation to complete.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on generated tokens, enforced by the provider only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Generated text returned by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Assistant reply; empty when the provider returned a null content.
    pub content: String,
    /// Model reported by the provider, if any.
    pub model: Option<String>,
}

/// Interface implemented by completion providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate the next assistant message for the supplied conversation.
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError>;
}

/// Build a user-role message carrying `content`.
pub fn user_message(content: impl Into<String>) -> ChatMessage {
    let mut message = Map::new();
    message.insert("role".into(), Value::String("user".into()));
    message.insert("content".into(), Value::String(content.into()));
    message
}

/// Client for OpenAI-compatible chat-completion endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    /// Construct a client for `base_url` authenticating with `api_key`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, CompletionError> {
        let http = Client::builder()
            .user_agent(concat!("chatdoc/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|error| {
                CompletionError::Unavailable(format!("failed to build HTTP client: {error}"))
            })?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, CompletionError> {
        Self::new(config.openai_base_url.clone(), config.openai_api_key.clone())
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

fn provider_error_message(body: &str) -> String {
    serde_json::from_str::<ProviderErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.to_string())
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            temperature = request.temperature,
            max_tokens = ?request.max_tokens,
            "Requesting completion"
        );

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| {
                CompletionError::Unavailable(format!(
                    "failed to reach {}: {error}",
                    self.base_url
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Rejected {
                status,
                message: provider_error_message(&body),
            });
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|error| {
            CompletionError::InvalidResponse(format!("failed to decode completion: {error}"))
        })?;

        let choice = body.choices.into_iter().next().ok_or_else(|| {
            CompletionError::InvalidResponse("completion contained no choices".into())
        })?;

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            model: body.model,
        })
    }
}
