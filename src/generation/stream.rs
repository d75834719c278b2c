//! Streamed turn execution.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use super::tooling::{execute_tool_call, tool_definitions};
use super::MAX_TOOL_ITERATIONS;
use crate::error::DocentError;
use crate::provider::{ModelProvider, ProviderRequest};
use crate::tools::{SharedTool, ToolExecutionContext};
use crate::types::*;

/// Events produced while a streamed turn runs.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// Assistant text, forwarded as soon as the provider yields it.
    TextDelta(String),
    /// A tool call finished executing.
    ToolInvoked(ToolInvocation),
    /// The turn is over; always the last event of a successful turn.
    Completed(GenerateTextResult),
}

/// Run a turn, streaming every provider round-trip.
///
/// Text is yielded as it arrives; tool calls are executed between
/// round-trips exactly as in [`generate_text`](super::generate_text).
pub fn stream_text_with_tools(
    provider: Arc<dyn ModelProvider>,
    mut messages: Vec<ModelMessage>,
    settings: GenerationSettings,
    tools: Vec<SharedTool>,
    ctx: ToolExecutionContext,
) -> BoxStream<'static, Result<TurnEvent, DocentError>> {
    let stream = async_stream::stream! {
        let tool_defs = tool_definitions(&tools);
        let mut appended = Vec::new();
        let mut invocations = Vec::new();
        let mut usage = Usage::default();
        let mut full_text = String::new();

        for iteration in 0..MAX_TOOL_ITERATIONS {
            let request = ProviderRequest {
                messages: messages.clone(),
                settings: settings.clone(),
                tools: tool_defs.clone(),
            };

            debug!(iteration, "stream_text_with_tools: calling provider");
            let mut deltas = match provider.stream_text(&request).await {
                Ok(deltas) => deltas,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut text = String::new();
            let mut calls = Vec::new();
            let mut finish_reason = None;
            while let Some(delta) = deltas.next().await {
                let delta = match delta {
                    Ok(delta) => delta,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                match delta.event_type {
                    StreamEventType::TextDelta if !delta.text.is_empty() => {
                        text.push_str(&delta.text);
                        yield Ok(TurnEvent::TextDelta(delta.text));
                    }
                    StreamEventType::TextDelta => {}
                    StreamEventType::ToolCallDelta => calls.extend(delta.tool_call),
                    StreamEventType::Done => {
                        if let Some(u) = delta.usage {
                            usage.merge(&u);
                        }
                        finish_reason = delta.finish_reason;
                    }
                }
            }
            full_text.push_str(&text);

            if calls.is_empty() {
                appended.push(ModelMessage::assistant(text));
                yield Ok(TurnEvent::Completed(GenerateTextResult {
                    text: full_text,
                    invocations,
                    messages: appended,
                    usage,
                    finish_reason,
                }));
                return;
            }

            let assistant = ModelMessage::assistant_tool_calls(&text, &calls);
            messages.push(assistant.clone());
            appended.push(assistant);

            for call in calls {
                let result = execute_tool_call(&tools, &call, &ctx).await;
                let message = ModelMessage::tool_result(result.clone());
                messages.push(message.clone());
                appended.push(message);
                let invocation = ToolInvocation { call, result };
                invocations.push(invocation.clone());
                yield Ok(TurnEvent::ToolInvoked(invocation));
            }
        }

        yield Ok(TurnEvent::Completed(GenerateTextResult {
            text: full_text,
            invocations,
            messages: appended,
            usage,
            finish_reason: Some(FinishReason::Length),
        }));
    };

    Box::pin(stream)
}

/// Drain a provider stream into a single result.
pub async fn collect_stream(
    mut stream: BoxStream<'static, Result<TextStreamDelta, DocentError>>,
) -> Result<StreamTextResult, DocentError> {
    let mut result = StreamTextResult::default();

    while let Some(delta) = stream.next().await {
        let delta = delta?;
        result.text.push_str(&delta.text);
        result.tool_calls.extend(delta.tool_call);
        if let Some(u) = delta.usage {
            result.usage.merge(&u);
        }
        if delta.finish_reason.is_some() {
            result.finish_reason = delta.finish_reason;
        }
    }

    Ok(result)
}
