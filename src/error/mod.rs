//! Error types for docent.

use thiserror::Error;

/// Primary error type for all docent operations.
#[derive(Error, Debug)]
pub enum DocentError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The retrieval index could not be built. There is no fallback for the
    /// primary knowledge source.
    #[error("Retrieval index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Tool channel connection failed: {0}")]
    Connection(String),

    #[error("Tool channel is not connected")]
    NotConnected,

    #[error("Remote call '{operation}' failed: {payload}")]
    RemoteCall {
        operation: String,
        payload: serde_json::Value,
    },

    #[error("Agent invocation failed: {0}")]
    AgentInvocation(#[source] Box<DocentError>),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Index,
    ToolChannel,
    Agent,
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Serialization,
    ToolExecution,
    Unknown,
}

impl DocentError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Wrap a failure raised during an agent turn.
    ///
    /// Errors that are already agent invocation errors, and index failures
    /// (which are surfaced as-is), are returned unchanged.
    pub fn agent_invocation(error: DocentError) -> Self {
        match error {
            Self::AgentInvocation(_) | Self::IndexUnavailable(_) => error,
            other => Self::AgentInvocation(Box::new(other)),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::IndexUnavailable(_) => ErrorCategory::Index,
            Self::Connection(_) | Self::NotConnected | Self::RemoteCall { .. } => {
                ErrorCategory::ToolChannel
            }
            Self::AgentInvocation(_) => ErrorCategory::Agent,
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether calling again could succeed. A remote error result is the
    /// server's answer and is not retryable.
    pub fn is_retryable(&self) -> bool {
        if let Self::RemoteCall { .. } = self {
            return false;
        }
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
                | ErrorCategory::ToolChannel
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, DocentError>;
