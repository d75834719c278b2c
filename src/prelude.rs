//! Convenience re-exports for common use.

pub use crate::adapters::{RemoteTools, ToolEnvelope};
pub use crate::agent::{Agent, AgentFactory};
pub use crate::channel::{ChannelState, RemoteOperation, ToolChannel};
pub use crate::config::DocentConfig;
pub use crate::dispatch::{FragmentStream, QueryDispatcher};
pub use crate::error::{DocentError, Result};
pub use crate::provider::{ModelProvider, ProviderFactory};
pub use crate::retrieval::{IndexLoader, Passage, RetrievalIndex, SharedIndex};
pub use crate::session::{EvictionPolicy, SessionCache};
pub use crate::tools::{AgentTool, AgentToolParameters, Tool, ToolArguments};
pub use crate::types::{GenerateTextResult, GenerationSettings, ModelMessage, Role};
