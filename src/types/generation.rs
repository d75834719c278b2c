//! Generation settings, usage accounting and results.

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::message::{AgentToolCall, AgentToolResult, ModelMessage};

/// Settings controlling text generation.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub user: Option<String>,
}

/// Why generation finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

/// Token usage for a generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Accumulate another usage into this one.
    pub fn merge(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// One tool call made during a turn, paired with its result.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub call: AgentToolCall,
    pub result: AgentToolResult,
}

/// Result of a complete (possibly multi-step) agent turn.
#[derive(Debug, Clone)]
pub struct GenerateTextResult {
    pub text: String,
    /// Tool calls in the order they were executed.
    pub invocations: Vec<ToolInvocation>,
    /// Messages appended during the turn, excluding the prompt.
    pub messages: Vec<ModelMessage>,
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
}
