use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DocentError;

/// Result shape every remote-tool adapter returns to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: String,
}

impl ToolEnvelope {
    pub fn ok(data: Value, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: message.into(),
        }
    }

    pub fn failure(error: &DocentError, message: impl Into<String>) -> Self {
        let data = match error {
            DocentError::RemoteCall { payload, .. } if !payload.is_null() => Some(payload.clone()),
            _ => None,
        };
        Self {
            success: false,
            data,
            error: Some(error.to_string()),
            message: message.into(),
        }
    }

    pub fn into_value(self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "success": false,
                "error": e.to_string(),
                "message": "Tool result could not be serialized",
            })
        })
    }
}
