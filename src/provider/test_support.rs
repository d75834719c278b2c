//! Scripted provider for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, BoxStream};

use super::{ModelProvider, ProviderFactory, ProviderRequest, ProviderResponse};
use crate::config::ModelConfig;
use crate::error::DocentError;
use crate::types::{AgentToolCall, FinishReason, TextStreamDelta};

/// Replays queued responses in order, for both whole and streamed calls.
/// Streamed text is split into word-sized deltas.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, DocentError>>>,
    pub requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: DocentError) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([Err(error)])),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn text(text: &str) -> ProviderResponse {
        ProviderResponse {
            text: text.into(),
            finish_reason: Some(FinishReason::Stop),
            ..Default::default()
        }
    }

    pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> ProviderResponse {
        ProviderResponse {
            tool_calls: vec![AgentToolCall {
                id: id.into(),
                name: name.into(),
                arguments,
            }],
            finish_reason: Some(FinishReason::ToolCalls),
            ..Default::default()
        }
    }

    fn next(&self, request: &ProviderRequest) -> Result<ProviderResponse, DocentError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(DocentError::Stream("script exhausted".into())))
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    async fn generate_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<ProviderResponse, DocentError> {
        self.next(request)
    }

    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta, DocentError>>, DocentError> {
        let response = self.next(request)?;
        let mut deltas: Vec<Result<TextStreamDelta, DocentError>> = response
            .text
            .split_inclusive(' ')
            .map(|chunk| Ok(TextStreamDelta::text(chunk)))
            .collect();
        deltas.extend(
            response
                .tool_calls
                .into_iter()
                .map(|call| Ok(TextStreamDelta::tool_call(call))),
        );
        deltas.push(Ok(TextStreamDelta::done(
            response.finish_reason,
            Some(response.usage),
        )));
        Ok(Box::pin(stream::iter(deltas)))
    }
}

/// Hands out one shared scripted provider.
pub struct ScriptedFactory(pub Arc<ScriptedProvider>);

impl ProviderFactory for ScriptedFactory {
    fn create(&self, _config: &ModelConfig) -> Result<Arc<dyn ModelProvider>, DocentError> {
        Ok(self.0.clone())
    }
}
