//! Shared test helpers: a mock provider, a static index and a fake tool server.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use serde_json::Value;

use docent::adapters::RemoteTools;
use docent::channel::{RemoteOperation, RemoteToolNames, ToolChannel, UnconfiguredTransport};
use docent::config::{DocentConfig, ModelConfig};
use docent::error::DocentError;
use docent::provider::{ModelProvider, ProviderFactory, ProviderRequest, ProviderResponse};
use docent::retrieval::{IndexLoader, Passage, RetrievalIndex, SharedIndex};
use docent::types::*;

/// One scripted model reply.
#[derive(Clone)]
pub struct MockTurn {
    pub text: String,
    pub tool_calls: Vec<AgentToolCall>,
    /// When set, the streamed variant fails with this after its text.
    pub stream_failure: Option<String>,
}

impl MockTurn {
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            tool_calls: Vec::new(),
            stream_failure: None,
        }
    }

    pub fn tool_call(id: &str, name: &str, arguments: Value) -> Self {
        Self {
            text: String::new(),
            tool_calls: vec![AgentToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments,
            }],
            stream_failure: None,
        }
    }

    pub fn fails_mid_stream(text: &str, message: &str) -> Self {
        Self {
            stream_failure: Some(message.to_string()),
            ..Self::text(text)
        }
    }

    fn response(&self) -> ProviderResponse {
        ProviderResponse {
            text: self.text.clone(),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
                total_tokens: 15,
            },
            tool_calls: self.tool_calls.clone(),
            finish_reason: Some(if self.tool_calls.is_empty() {
                FinishReason::Stop
            } else {
                FinishReason::ToolCalls
            }),
        }
    }
}

/// A mock provider that replays queued turns and records every request.
#[derive(Default)]
pub struct MockProvider {
    turns: Mutex<VecDeque<MockTurn>>,
    failure: Mutex<Option<String>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_turns(turns: impl IntoIterator<Item = MockTurn>) -> Arc<Self> {
        let provider = Self::new();
        provider.turns.lock().unwrap().extend(turns);
        Arc::new(provider)
    }

    /// Every call fails with an API error carrying `message`.
    pub fn failing(message: &str) -> Arc<Self> {
        let provider = Self::new();
        *provider.failure.lock().unwrap() = Some(message.to_string());
        Arc::new(provider)
    }

    pub fn queue(&self, turn: MockTurn) {
        self.turns.lock().unwrap().push_back(turn);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: &ProviderRequest) -> Result<MockTurn, DocentError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(DocentError::api(500, message));
        }
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DocentError::api(500, "mock provider has no queued turns"))
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse, DocentError> {
        Ok(self.next(request)?.response())
    }

    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta, DocentError>>, DocentError> {
        let turn = self.next(request)?;
        let response = turn.response();

        let mut items: Vec<Result<TextStreamDelta, DocentError>> = response
            .text
            .split_inclusive(' ')
            .map(|word| Ok(TextStreamDelta::text(word)))
            .collect();
        if let Some(message) = turn.stream_failure {
            items.push(Err(DocentError::Stream(message)));
        } else {
            items.extend(
                response
                    .tool_calls
                    .into_iter()
                    .map(|call| Ok(TextStreamDelta::tool_call(call))),
            );
            items.push(Ok(TextStreamDelta::done(
                response.finish_reason,
                Some(response.usage),
            )));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

/// Hands out the same mock provider for every agent.
pub struct MockFactory(pub Arc<MockProvider>);

impl ProviderFactory for MockFactory {
    fn create(&self, _config: &ModelConfig) -> Result<Arc<dyn ModelProvider>, DocentError> {
        Ok(self.0.clone())
    }
}

/// Returns the same passages for any query.
pub struct StaticIndex {
    passages: Vec<Passage>,
    queries: Mutex<Vec<String>>,
}

impl StaticIndex {
    pub fn new(passages: Vec<Passage>) -> Arc<Self> {
        Arc::new(Self {
            passages,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl RetrievalIndex for StaticIndex {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, DocentError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.passages.iter().take(top_k).cloned().collect())
    }
}

/// A loader whose build always fails.
pub struct BrokenLoader;

#[async_trait]
impl IndexLoader for BrokenLoader {
    async fn load(&self) -> Result<Arc<dyn RetrievalIndex>, DocentError> {
        Err(DocentError::IndexUnavailable("embedding store offline".into()))
    }
}

/// In-process stand-in for the component tool server.
pub struct FakeToolServer {
    components: Value,
    details: Value,
    pub calls: Mutex<Vec<(RemoteOperation, Value)>>,
}

impl FakeToolServer {
    pub fn new(components: Value, details: Value) -> Arc<Self> {
        Arc::new(Self {
            components,
            details,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn operations(&self) -> Vec<RemoteOperation> {
        self.calls.lock().unwrap().iter().map(|(op, _)| *op).collect()
    }
}

#[async_trait]
impl RemoteTools for FakeToolServer {
    fn is_ready(&self) -> bool {
        true
    }

    async fn connect(&self) -> Result<(), DocentError> {
        Ok(())
    }

    async fn call(&self, operation: RemoteOperation, arguments: Value) -> Result<Value, DocentError> {
        self.calls.lock().unwrap().push((operation, arguments));
        Ok(match operation {
            RemoteOperation::ListComponents => self.components.clone(),
            RemoteOperation::ComponentDetails => self.details.clone(),
        })
    }
}

/// A channel with no tool server behind it.
pub fn unreachable_channel() -> Arc<ToolChannel> {
    Arc::new(ToolChannel::new(
        Box::new(UnconfiguredTransport),
        RemoteToolNames::default(),
    ))
}

pub fn button_passages() -> Vec<Passage> {
    vec![
        Passage::new("Button renders a clickable control.").with_source("button.mdx"),
        Passage::new("Use variant=\"primary\" for the main action.").with_source("button.mdx"),
    ]
}

pub fn test_config() -> DocentConfig {
    let mut config = DocentConfig::default();
    config.model.provider = "mock".into();
    config.model.model_id = "mock-model".into();
    config
}

/// A ready index with the Button passages.
pub fn ready_index() -> Arc<SharedIndex> {
    Arc::new(SharedIndex::ready(StaticIndex::new(button_passages())))
}
