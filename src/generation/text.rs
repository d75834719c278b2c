//! Non-streamed turn execution.

use tracing::debug;

use super::tooling::{execute_tool_call, tool_definitions};
use super::MAX_TOOL_ITERATIONS;
use crate::error::DocentError;
use crate::provider::{ModelProvider, ProviderRequest};
use crate::tools::{SharedTool, ToolExecutionContext};
use crate::types::*;

/// Run a turn to completion.
///
/// Tool calls returned by the model are executed in order and fed back
/// until the model answers without calling tools. The result text is every
/// piece of assistant text produced during the turn, in order, so it matches
/// what a streamed turn emits.
pub async fn generate_text(
    provider: &dyn ModelProvider,
    mut messages: Vec<ModelMessage>,
    settings: GenerationSettings,
    tools: &[SharedTool],
    ctx: &ToolExecutionContext,
) -> Result<GenerateTextResult, DocentError> {
    let tool_defs = tool_definitions(tools);
    let mut appended = Vec::new();
    let mut invocations = Vec::new();
    let mut usage = Usage::default();
    let mut text = String::new();

    for iteration in 0..MAX_TOOL_ITERATIONS {
        let request = ProviderRequest {
            messages: messages.clone(),
            settings: settings.clone(),
            tools: tool_defs.clone(),
        };

        debug!(iteration, "generate_text: calling provider");
        let response = provider.generate_text(&request).await?;
        usage.merge(&response.usage);
        text.push_str(&response.text);

        if response.tool_calls.is_empty() {
            appended.push(ModelMessage::assistant(response.text));
            return Ok(GenerateTextResult {
                text,
                invocations,
                messages: appended,
                usage,
                finish_reason: response.finish_reason,
            });
        }

        let assistant = ModelMessage::assistant_tool_calls(&response.text, &response.tool_calls);
        messages.push(assistant.clone());
        appended.push(assistant);

        for call in response.tool_calls {
            let result = execute_tool_call(tools, &call, ctx).await;
            let message = ModelMessage::tool_result(result.clone());
            messages.push(message.clone());
            appended.push(message);
            invocations.push(ToolInvocation { call, result });
        }
    }

    Ok(GenerateTextResult {
        text,
        invocations,
        messages: appended,
        usage,
        finish_reason: Some(FinishReason::Length),
    })
}
