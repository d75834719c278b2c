use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::index::RetrievalIndex;
use crate::error::DocentError;
use crate::tools::{AgentToolParameters, Tool, ToolArguments, ToolExecutionContext};

pub const RETRIEVAL_TOOL_NAME: &str = "search_documentation";

const MAX_TOP_K: usize = 20;

/// Searches the documentation corpus for guides and usage examples.
pub struct RetrievalTool {
    index: Arc<dyn RetrievalIndex>,
    default_top_k: usize,
    parameters: AgentToolParameters,
}

impl RetrievalTool {
    pub fn new(index: Arc<dyn RetrievalIndex>, default_top_k: usize) -> Self {
        Self {
            index,
            default_top_k: default_top_k.clamp(1, MAX_TOP_K),
            parameters: AgentToolParameters::object()
                .string("query", "What to look for in the documentation", true)
                .integer("top_k", "Maximum number of passages to return", false)
                .build(),
        }
    }
}

#[async_trait]
impl Tool for RetrievalTool {
    fn name(&self) -> &str {
        RETRIEVAL_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the component library documentation. Best for usage examples, guides, \
patterns and explanations."
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<Value, DocentError> {
        let query = args.get_str("query")?.trim();
        if query.is_empty() {
            return Err(DocentError::InvalidArgument("query must not be empty".into()));
        }
        let top_k = args
            .get_u64_opt("top_k")
            .map(|k| (k as usize).clamp(1, MAX_TOP_K))
            .unwrap_or(self.default_top_k);

        let passages = self.index.search(query, top_k).await?;
        debug!(session_id = ?ctx.session_id, hits = passages.len(), "documentation search");

        Ok(json!({
            "query": query,
            "count": passages.len(),
            "passages": passages,
        }))
    }
}
