//! Assistant service shared by the HTTP handlers.

use crate::{
    analysis::{AnalysisError, AnalysisResult, UploadedFile, analyze_document},
    chat::{ChatError, ChatReply, ChatRequest, relay_chat},
    completion::CompletionClient,
    config::{Config, DEFAULT_CHAT_MODEL, DEFAULT_SUMMARY_MODEL},
};
use async_trait::async_trait;
use std::sync::Arc;

/// Model names applied by the service.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Model used for chat requests that do not name one.
    pub chat_default_model: String,
    /// Model used for document summaries.
    pub summary_model: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            chat_default_model: DEFAULT_CHAT_MODEL.into(),
            summary_model: DEFAULT_SUMMARY_MODEL.into(),
        }
    }
}

impl From<&Config> for ModelSettings {
    fn from(config: &Config) -> Self {
        Self {
            chat_default_model: config.chat_default_model.clone(),
            summary_model: config.summary_model.clone(),
        }
    }
}

/// Abstraction over the request handlers used by the HTTP surface.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Relay a conversation to the completion provider.
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ChatError>;

    /// Extract, truncate, and summarize an uploaded document.
    async fn analyze(&self, file: UploadedFile) -> Result<AnalysisResult, AnalysisError>;
}

/// Stateless coordinator holding the completion handle and model settings.
///
/// Construct once near process start and share it through an `Arc`; nothing in it is mutated
/// after construction.
pub struct AssistantService<C: ?Sized> {
    models: ModelSettings,
    client: Arc<C>,
}

impl<C> AssistantService<C>
where
    C: CompletionClient + ?Sized,
{
    /// Build a service around `client`.
    pub fn new(client: Arc<C>, models: ModelSettings) -> Self {
        Self { models, client }
    }
}

#[async_trait]
impl<C> AssistantApi for AssistantService<C>
where
    C: CompletionClient + ?Sized + 'static,
{
    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, ChatError> {
        relay_chat(self.client.as_ref(), request, &self.models.chat_default_model).await
    }

    async fn analyze(&self, file: UploadedFile) -> Result<AnalysisResult, AnalysisError> {
        analyze_document(self.client.as_ref(), file, &self.models.summary_model).await
    }
}
