//! OpenAI Chat Completions provider (also serves OpenAI-compatible endpoints).

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::DocentError;
use crate::types::*;

use super::http::{bearer_headers, parse_sse_data, shared_client, status_to_error};
use super::{ModelProvider, ProviderRequest, ProviderResponse};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    model_id: String,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(model_id: String, api_key: String, base_url: Option<String>) -> Self {
        Self {
            model_id,
            api_key,
            base_url: base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request_body(&self, request: &ProviderRequest, stream: bool) -> Value {
        let mut body = serde_json::Map::new();
        body.insert("model".into(), json!(self.model_id));
        body.insert(
            "messages".into(),
            request.messages.iter().map(message_to_openai).collect(),
        );
        body.insert("stream".into(), json!(stream));

        if let Some(max) = request.settings.max_tokens {
            body.insert("max_tokens".into(), max.into());
        }
        if let Some(temp) = request.settings.temperature {
            body.insert("temperature".into(), temp.into());
        }
        if let Some(ref user) = request.settings.user {
            body.insert("user".into(), user.clone().into());
        }

        if let Some(tools) = request.tools.as_ref().filter(|tools| !tools.is_empty()) {
            let defs: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body.insert("tools".into(), defs.into());
        }

        Value::Object(body)
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response, DocentError> {
        let resp = shared_client()
            .post(self.completions_url())
            .headers(bearer_headers(&self.api_key))
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate_text(&self, request: &ProviderRequest) -> Result<ProviderResponse, DocentError> {
        debug!(model = %self.model_id, "OpenAI generate_text");
        let body = self.build_request_body(request, false);
        let data: ChatResponse = self.post(&body).await?.json().await?;

        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DocentError::api(200, "No choices in OpenAI response"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| AgentToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: decode_arguments(tc.function.arguments),
            })
            .collect();

        Ok(ProviderResponse {
            text: choice.message.content.unwrap_or_default(),
            usage: data.usage.map(Usage::from).unwrap_or_default(),
            tool_calls,
            finish_reason: choice.finish_reason.as_deref().and_then(parse_finish_reason),
        })
    }

    async fn stream_text(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<TextStreamDelta, DocentError>>, DocentError> {
        debug!(model = %self.model_id, "OpenAI stream_text");
        let body = self.build_request_body(request, true);
        let byte_stream = self.post(&body).await?.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = String::new();
            let mut pending: BTreeMap<usize, PendingToolCall> = BTreeMap::new();
            let mut finished = false;
            futures::pin_mut!(byte_stream);

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(DocentError::Network(e));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer.drain(..=line_end);

                    let Some(data) = parse_sse_data(&line) else {
                        continue;
                    };
                    let Ok(parsed) = serde_json::from_str::<StreamChunk>(data) else {
                        continue;
                    };
                    let usage = parsed.usage.map(Usage::from);
                    let Some(choice) = parsed.choices.into_iter().next() else {
                        continue;
                    };

                    for fragment in choice.delta.tool_calls.unwrap_or_default() {
                        pending.entry(fragment.index).or_default().absorb(fragment);
                    }
                    if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                        yield Ok(TextStreamDelta::text(text));
                    }
                    if let Some(reason) = choice.finish_reason.as_deref() {
                        for call in std::mem::take(&mut pending).into_values() {
                            yield Ok(TextStreamDelta::tool_call(call.finish()));
                        }
                        yield Ok(TextStreamDelta::done(parse_finish_reason(reason), usage));
                        finished = true;
                    }
                }
            }

            if !finished {
                for call in pending.into_values() {
                    yield Ok(TextStreamDelta::tool_call(call.finish()));
                }
                yield Ok(TextStreamDelta::done(None, None));
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Tool call assembled from streamed fragments.
#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PendingToolCall {
    fn absorb(&mut self, fragment: StreamToolCall) {
        if let Some(id) = fragment.id {
            self.id = id;
        }
        if let Some(function) = fragment.function {
            if let Some(name) = function.name {
                self.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                self.arguments.push_str(&arguments);
            }
        }
    }

    fn finish(self) -> AgentToolCall {
        AgentToolCall {
            id: self.id,
            name: self.name,
            arguments: decode_arguments(self.arguments),
        }
    }
}

fn decode_arguments(raw: String) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

fn parse_finish_reason(s: &str) -> Option<FinishReason> {
    match s {
        "stop" => Some(FinishReason::Stop),
        "length" => Some(FinishReason::Length),
        "tool_calls" | "function_call" => Some(FinishReason::ToolCalls),
        "content_filter" => Some(FinishReason::ContentFilter),
        _ => None,
    }
}

fn message_to_openai(msg: &ModelMessage) -> Value {
    match msg.role {
        Role::Tool => {
            let Some(ContentPart::ToolResult(result)) = msg.content.first() else {
                return json!({ "role": "tool", "content": msg.text() });
            };
            json!({
                "role": "tool",
                "tool_call_id": result.tool_call_id,
                "content": result.result.to_string(),
            })
        }
        Role::Assistant if !msg.tool_calls().is_empty() => {
            let calls: Vec<Value> = msg
                .tool_calls()
                .into_iter()
                .map(|tc| {
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.arguments.to_string(),
                        }
                    })
                })
                .collect();
            let text = msg.text();
            json!({
                "role": "assistant",
                "content": if text.is_empty() { Value::Null } else { Value::String(text) },
                "tool_calls": calls,
            })
        }
        role => {
            let role = match role {
                Role::System => "system",
                Role::User => "user",
                _ => "assistant",
            };
            json!({ "role": role, "content": msg.text() })
        }
    }
}

// Wire types (internal)

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Deserialize)]
struct ChatToolCall {
    id: String,
    function: ChatFunction,
}

#[derive(Deserialize)]
struct ChatFunction {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(u: WireUsage) -> Self {
        Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Deserialize)]
struct StreamToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}
