//! Chat relay: forwards role-tagged messages to the completion provider.

use crate::completion::{ChatMessage, CompletionClient, CompletionError, CompletionRequest};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sampling temperature applied to relayed chat requests.
pub const CHAT_TEMPERATURE: f32 = 0.7;
/// Token bound applied when the caller omits `max_tokens`.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Errors produced by the chat relay.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Caller supplied no messages.
    #[error("Messages cannot be empty")]
    EmptyMessages,
    /// Completion provider failed.
    #[error("Completion request failed: {0}")]
    Upstream(#[from] CompletionError),
}

/// Body of a chat request.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Ordered conversation; each entry carries at least `role` and `content`.
    pub messages: Vec<ChatMessage>,
    /// Model override; the configured chat model is used when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// Upper bound on generated tokens (defaults to [`DEFAULT_MAX_TOKENS`]).
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Assistant reply returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    /// Generated message text, verbatim.
    pub content: String,
    /// Always `"assistant"`.
    pub role: String,
    /// Model the request was issued against.
    pub model: String,
}

/// Relay `request` to `client` and shape the assistant reply.
///
/// Empty conversations are rejected before any outbound call is made.
pub async fn relay_chat<C>(
    client: &C,
    request: ChatRequest,
    default_model: &str,
) -> Result<ChatReply, ChatError>
where
    C: CompletionClient + ?Sized,
{
    if request.messages.is_empty() {
        return Err(ChatError::EmptyMessages);
    }

    let model = request
        .model
        .unwrap_or_else(|| default_model.to_string());
    let completion = client
        .complete(CompletionRequest {
            model: model.clone(),
            messages: request.messages,
            temperature: CHAT_TEMPERATURE,
            max_tokens: Some(request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
        })
        .await?;

    Ok(ChatReply {
        content: completion.content,
        role: "assistant".into(),
        model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{Completion, user_message};
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        calls: Arc<Mutex<Vec<CompletionRequest>>>,
        fail: bool,
    }

    #[async_trait]
    impl CompletionClient for RecordingClient {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<Completion, CompletionError> {
            self.calls.lock().await.push(request);
            if self.fail {
                return Err(CompletionError::Rejected {
                    status: StatusCode::TOO_MANY_REQUESTS,
                    message: "quota exceeded".into(),
                });
            }
            Ok(Completion {
                content: "Hi there".into(),
                model: Some("provider-model".into()),
            })
        }
    }

    fn request(messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            messages,
            model: None,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn relay_applies_defaults_and_fixed_temperature() {
        let client = RecordingClient::default();
        let reply = relay_chat(&client, request(vec![user_message("Hello")]), "gpt-3.5-turbo")
            .await
            .expect("reply");

        assert_eq!(reply.content, "Hi there");
        assert_eq!(reply.role, "assistant");
        assert_eq!(reply.model, "gpt-3.5-turbo");

        let calls = client.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "gpt-3.5-turbo");
        assert_eq!(calls[0].temperature, CHAT_TEMPERATURE);
        assert_eq!(calls[0].max_tokens, Some(DEFAULT_MAX_TOKENS));
        assert_eq!(calls[0].messages[0]["content"], "Hello");
    }

    #[tokio::test]
    async fn relay_honours_explicit_model_and_token_bound() {
        let client = RecordingClient::default();
        let reply = relay_chat(
            &client,
            ChatRequest {
                messages: vec![user_message("one"), user_message("two")],
                model: Some("gpt-4o".into()),
                max_tokens: Some(42),
            },
            "gpt-3.5-turbo",
        )
        .await
        .expect("reply");

        assert_eq!(reply.model, "gpt-4o");
        assert_eq!(reply.role, "assistant");
        let calls = client.calls.lock().await;
        assert_eq!(calls[0].max_tokens, Some(42));
        assert_eq!(calls[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn empty_messages_rejected_before_outbound_call() {
        let client = RecordingClient::default();
        let error = relay_chat(&client, request(Vec::new()), "gpt-3.5-turbo")
            .await
            .expect_err("empty");

        assert!(matches!(error, ChatError::EmptyMessages));
        assert!(client.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn upstream_failure_carries_provider_message() {
        let client = RecordingClient {
            fail: true,
            ..Default::default()
        };
        let error = relay_chat(&client, request(vec![user_message("Hello")]), "gpt-3.5-turbo")
            .await
            .expect_err("upstream");

        assert!(matches!(error, ChatError::Upstream(_)));
        assert!(error.to_string().contains("quota exceeded"));
    }

    #[test]
    fn request_keeps_extra_message_keys() {
        let parsed: ChatRequest = serde_json::from_value(serde_json::json!({
            "messages": [{"role": "user", "content": "hi", "name": "alice"}]
        }))
        .expect("parse");
        assert_eq!(parsed.messages[0]["name"], "alice");
        assert!(parsed.model.is_none());
        assert!(parsed.max_tokens.is_none());
    }
}
