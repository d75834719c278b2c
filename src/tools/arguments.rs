//! Typed access to tool call arguments.

use crate::error::DocentError;

/// Wrapper around the JSON arguments of a tool call.
///
/// Models occasionally send arguments as a JSON-encoded string rather than
/// an object; every accessor sees through that.
#[derive(Debug, Clone)]
pub struct ToolArguments {
    value: serde_json::Value,
}

impl ToolArguments {
    pub fn new(value: serde_json::Value) -> Self {
        let value = match value {
            serde_json::Value::String(raw) if raw.trim().is_empty() => serde_json::json!({}),
            serde_json::Value::String(raw) => {
                serde_json::from_str(raw.trim()).unwrap_or(serde_json::Value::String(raw))
            }
            serde_json::Value::Null => serde_json::json!({}),
            other => other,
        };
        Self { value }
    }

    pub fn raw(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn get_str(&self, key: &str) -> Result<&str, DocentError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| DocentError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    pub fn get_u64_opt(&self, key: &str) -> Option<u64> {
        self.value.get(key).and_then(|v| v.as_u64())
    }

    /// A list of strings. A bare string is accepted as a one-item list.
    pub fn get_string_list(&self, key: &str) -> Result<Vec<String>, DocentError> {
        match self.value.get(key) {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        DocentError::InvalidArgument(format!("{key} must contain only strings"))
                    })
                })
                .collect(),
            Some(serde_json::Value::String(single)) => Ok(vec![single.clone()]),
            _ => Err(DocentError::InvalidArgument(format!(
                "Missing string list argument: {key}"
            ))),
        }
    }
}
