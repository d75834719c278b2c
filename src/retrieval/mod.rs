//! Documentation retrieval: the primary knowledge source of every agent.

mod http;
mod index;
mod tool;

pub use http::{HttpIndexLoader, HttpRetrievalIndex};
pub use index::{IndexLoader, Passage, RetrievalIndex, SharedIndex};
pub use tool::{RetrievalTool, RETRIEVAL_TOOL_NAME};
