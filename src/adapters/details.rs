use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ensure_ready, RemoteTools, ToolEnvelope};
use crate::channel::RemoteOperation;
use crate::error::DocentError;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};

pub const DETAILS_TOOL_NAME: &str = "get_component_details";

const NAMES_ARG: &str = "componentNames";

const UNAVAILABLE: &str = "Component details are unavailable right now. \
Answer from search_documentation and say that the properties could not be verified.";

/// Fetches authoritative metadata (props, types, defaults) for a batch of
/// components.
pub struct ComponentDetailsTool {
    remote: Arc<dyn RemoteTools>,
    parameters: AgentToolParameters,
}

impl ComponentDetailsTool {
    pub fn new(remote: Arc<dyn RemoteTools>) -> Self {
        Self {
            remote,
            parameters: AgentToolParameters::object()
                .string_array(
                    NAMES_ARG,
                    "Names of the components to look up, e.g. [\"Button\", \"Card\"]",
                    true,
                )
                .build(),
        }
    }

    async fn run(&self, args: &ToolArguments) -> ToolEnvelope {
        let names = match requested_names(args) {
            Ok(names) => names,
            Err(e) => return ToolEnvelope::failure(&e, "Pass at least one component name."),
        };

        if let Err(e) = ensure_ready(self.remote.as_ref()).await {
            warn!(tool = DETAILS_TOOL_NAME, error = %e, "tool channel unavailable");
            return ToolEnvelope::failure(&e, UNAVAILABLE);
        }

        let payload = match self
            .remote
            .call(RemoteOperation::ComponentDetails, json!({ NAMES_ARG: names }))
            .await
        {
            Ok(payload) => payload,
            Err(e) => {
                warn!(tool = DETAILS_TOOL_NAME, error = %e, "component details lookup failed");
                return ToolEnvelope::failure(&e, UNAVAILABLE);
            }
        };

        let (found, not_found) = partition_details(&names, &payload);
        debug!(
            tool = DETAILS_TOOL_NAME,
            found = found.len(),
            not_found = not_found.len(),
            "component details partitioned"
        );

        let mut message = format!(
            "Found {} of {} requested components",
            found.len(),
            names.len()
        );
        if !not_found.is_empty() {
            message.push_str(&format!("; no record for: {}", not_found.join(", ")));
        }

        ToolEnvelope::ok(json!({ "found": found, "notFound": not_found }), message)
    }
}

fn requested_names(args: &ToolArguments) -> Result<Vec<String>, DocentError> {
    let mut names: Vec<String> = Vec::new();
    for name in args.get_string_list(NAMES_ARG)? {
        let name = name.trim();
        if !name.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    }
    if names.is_empty() {
        return Err(DocentError::InvalidArgument(format!(
            "{NAMES_ARG} must contain at least one name"
        )));
    }
    Ok(names)
}

/// Split a details payload into entries for the requested names and the
/// names with no record.
///
/// Accepts an array of entries carrying a `name` field, or an object keyed
/// by component name where `null` means unknown. Names match
/// case-insensitively and keep the order they were requested in.
pub fn partition_details(requested: &[String], payload: &Value) -> (Vec<Value>, Vec<String>) {
    let mut found = Vec::new();
    let mut not_found = Vec::new();

    for name in requested {
        match lookup(payload, name) {
            Some(entry) => found.push(entry),
            None => not_found.push(name.clone()),
        }
    }

    (found, not_found)
}

fn lookup(payload: &Value, name: &str) -> Option<Value> {
    let matches = |candidate: &str| candidate.eq_ignore_ascii_case(name);

    match payload {
        Value::Array(entries) => entries
            .iter()
            .find(|entry| entry.get("name").and_then(Value::as_str).is_some_and(matches))
            .cloned(),
        Value::Object(map) => {
            if let Some(Value::Array(_)) = map.get("components") {
                return lookup(&map["components"], name);
            }
            if map.get("name").and_then(Value::as_str).is_some_and(matches) {
                return Some(payload.clone());
            }
            map.iter()
                .find(|(key, value)| matches(key) && !value.is_null())
                .map(|(key, value)| match value {
                    Value::Object(entry) if !entry.contains_key("name") => {
                        let mut entry = entry.clone();
                        entry.insert("name".into(), Value::String(key.clone()));
                        Value::Object(entry)
                    }
                    other => other.clone(),
                })
        }
        _ => None,
    }
}

#[async_trait]
impl Tool for ComponentDetailsTool {
    fn name(&self) -> &str {
        DETAILS_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Get authoritative details (props, types, default values) for one or more \
components. Reports separately which requested components do not exist."
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        _ctx: &ToolExecutionContext,
    ) -> Result<Value, DocentError> {
        Ok(self.run(args).await.into_value())
    }
}
