//! Streaming types.

use serde::{Deserialize, Serialize};

use super::generation::{FinishReason, Usage};
use super::message::AgentToolCall;

/// A delta emitted by a streaming model call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextStreamDelta {
    /// Incremental text; empty for non-text events.
    pub text: String,
    pub event_type: StreamEventType,
    /// A fully assembled tool call (only on `ToolCallDelta`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<AgentToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl TextStreamDelta {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            event_type: StreamEventType::TextDelta,
            tool_call: None,
            finish_reason: None,
            usage: None,
        }
    }

    pub fn tool_call(call: AgentToolCall) -> Self {
        Self {
            text: String::new(),
            event_type: StreamEventType::ToolCallDelta,
            tool_call: Some(call),
            finish_reason: None,
            usage: None,
        }
    }

    pub fn done(finish_reason: Option<FinishReason>, usage: Option<Usage>) -> Self {
        Self {
            text: String::new(),
            event_type: StreamEventType::Done,
            tool_call: None,
            finish_reason,
            usage,
        }
    }
}

/// Type of stream event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamEventType {
    TextDelta,
    /// A complete tool call; providers assemble argument fragments first.
    ToolCallDelta,
    Done,
}

/// Final result after consuming a text stream.
#[derive(Debug, Clone, Default)]
pub struct StreamTextResult {
    pub text: String,
    pub tool_calls: Vec<AgentToolCall>,
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
}
