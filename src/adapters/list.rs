use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::{ensure_ready, RemoteTools, ToolEnvelope};
use crate::channel::RemoteOperation;
use crate::error::DocentError;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};

pub const LIST_TOOL_NAME: &str = "list_components";

const UNAVAILABLE: &str = "The component list is unavailable right now. \
Answer from search_documentation and say that the component catalog could not be checked.";

/// Enumerates every component the library ships.
pub struct ListComponentsTool {
    remote: Arc<dyn RemoteTools>,
    parameters: AgentToolParameters,
}

impl ListComponentsTool {
    pub fn new(remote: Arc<dyn RemoteTools>) -> Self {
        Self {
            remote,
            parameters: AgentToolParameters::empty(),
        }
    }

    async fn run(&self) -> ToolEnvelope {
        if let Err(e) = ensure_ready(self.remote.as_ref()).await {
            warn!(tool = LIST_TOOL_NAME, error = %e, "tool channel unavailable");
            return ToolEnvelope::failure(&e, UNAVAILABLE);
        }

        match self.remote.call(RemoteOperation::ListComponents, Value::Null).await {
            Ok(payload) => {
                let message = match count_entries(&payload) {
                    Some(1) => "Found 1 component".to_string(),
                    Some(n) => format!("Found {n} components"),
                    None => "Retrieved the component list".to_string(),
                };
                ToolEnvelope::ok(payload, message)
            }
            Err(e) => {
                warn!(tool = LIST_TOOL_NAME, error = %e, "listing components failed");
                ToolEnvelope::failure(&e, UNAVAILABLE)
            }
        }
    }
}

fn count_entries(payload: &Value) -> Option<usize> {
    match payload {
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => match map.get("components") {
            Some(Value::Array(items)) => Some(items.len()),
            _ => Some(map.len()),
        },
        _ => None,
    }
}

#[async_trait]
impl Tool for ListComponentsTool {
    fn name(&self) -> &str {
        LIST_TOOL_NAME
    }

    fn description(&self) -> &str {
        "List every component available in the library. Authoritative: use it to check \
whether a component exists before describing it."
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        _args: &ToolArguments,
        _ctx: &ToolExecutionContext,
    ) -> Result<Value, DocentError> {
        Ok(self.run().await.into_value())
    }
}
