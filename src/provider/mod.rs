//! Model provider trait, factory and the built-in OpenAI-compatible transport.

pub mod http;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::error::DocentError;
use crate::types::{
    AgentToolCall, FinishReason, GenerationSettings, ModelMessage, TextStreamDelta, Usage,
};

/// A request sent to a model provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub messages: Vec<ModelMessage>,
    pub settings: GenerationSettings,
    pub tools: Option<Vec<ToolDefinition>>,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Response from a non-streaming provider call.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    pub text: String,
    pub usage: Usage,
    pub tool_calls: Vec<AgentToolCall>,
    pub finish_reason: Option<FinishReason>,
}

/// Core trait implemented by model transports.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g. "openai").
    fn provider_name(&self) -> &str;

    fn model_id(&self) -> &str;

    async fn generate_text(&self, request: &ProviderRequest)
        -> Result<ProviderResponse, DocentError>;

    /// Stream a response. Tool calls arrive as complete `ToolCallDelta` items.
    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta, DocentError>>, DocentError>;
}

/// Creates model clients from configuration.
///
/// Injected into the agent factory so tests can substitute scripted models.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, config: &ModelConfig) -> Result<Arc<dyn ModelProvider>, DocentError>;
}

/// Factory for the providers compiled into this build.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProviderFactory;

impl ProviderFactory for DefaultProviderFactory {
    #[allow(unused_variables)]
    fn create(&self, config: &ModelConfig) -> Result<Arc<dyn ModelProvider>, DocentError> {
        match config.provider.as_str() {
            #[cfg(feature = "openai")]
            "openai" | "openai-compatible" => {
                let api_key = config.api_key.clone().ok_or_else(|| {
                    DocentError::Authentication("Missing OPENAI_API_KEY".into())
                })?;
                Ok(Arc::new(openai::OpenAiProvider::new(
                    config.model_id.clone(),
                    api_key,
                    config.base_url.clone(),
                )))
            }
            other => Err(DocentError::Configuration(format!(
                "No provider available for '{other}' (check enabled features)"
            ))),
        }
    }
}
