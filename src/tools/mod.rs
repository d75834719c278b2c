//! Tool system for function calling.

pub mod arguments;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use tool::{AgentTool, SharedTool, Tool, ToolExecutionContext};
pub use types::{AgentToolParameters, ParameterBuilder};
