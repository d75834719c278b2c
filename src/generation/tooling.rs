use serde_json::json;
use tracing::{debug, warn};

use crate::error::DocentError;
use crate::provider::ToolDefinition;
use crate::tools::{SharedTool, ToolArguments, ToolExecutionContext};
use crate::types::{AgentToolCall, AgentToolResult};

pub(super) fn tool_definitions(tools: &[SharedTool]) -> Option<Vec<ToolDefinition>> {
    if tools.is_empty() {
        None
    } else {
        Some(tools.iter().map(|t| t.definition()).collect())
    }
}

/// Run one tool call. Failures become error results for the model rather
/// than aborting the turn.
pub(super) async fn execute_tool_call(
    tools: &[SharedTool],
    call: &AgentToolCall,
    ctx: &ToolExecutionContext,
) -> AgentToolResult {
    let Some(tool) = tools.iter().find(|t| t.name() == call.name) else {
        warn!(tool = %call.name, "model requested unknown tool");
        let error = DocentError::ToolExecution {
            tool_name: call.name.clone(),
            message: "no such tool".into(),
        };
        return error_result(call, &error, false);
    };

    debug!(tool = %call.name, session_id = ?ctx.session_id, "executing tool");
    let args = ToolArguments::new(call.arguments.clone());
    match tool.execute(&args, ctx).await {
        Ok(result) => AgentToolResult {
            tool_call_id: call.id.clone(),
            result,
            is_error: false,
        },
        Err(e) => {
            warn!(tool = %call.name, error = %e, "tool execution failed");
            let error = DocentError::ToolExecution {
                tool_name: call.name.clone(),
                message: e.to_string(),
            };
            error_result(call, &error, e.is_retryable())
        }
    }
}

/// `{"error": .., "retryable": ..}`; `retryable` tells the model whether
/// calling again could succeed.
fn error_result(call: &AgentToolCall, error: &DocentError, retryable: bool) -> AgentToolResult {
    AgentToolResult {
        tool_call_id: call.id.clone(),
        result: json!({ "error": error.to_string(), "retryable": retryable }),
        is_error: true,
    }
}
