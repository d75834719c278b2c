//! Builds session agents.

use std::sync::Arc;

use super::Agent;
use crate::config::ModelConfig;
use crate::error::DocentError;
use crate::provider::ProviderFactory;
use crate::tools::SharedTool;
use crate::types::GenerationSettings;

/// Standing instructions for every documentation agent.
pub const SYSTEM_INSTRUCTION: &str = "\
You are a documentation assistant for a UI component library. You answer \
questions about its components using only the tools available to you.

Choosing tools:
- For questions about a component's specification (which components exist, \
their props, prop types, default values), call the authoritative component \
tools first: list_components to check what exists, get_component_details for \
props, types and defaults. Their answers take precedence over anything else.
- For usage examples, guides, patterns and explanations, call \
search_documentation.
- For comprehensive answers, combine both: authoritative details for the \
facts and documentation passages for how to use them.
- If the component tools report that they are unavailable, answer from \
search_documentation and say that the details could not be verified.

Rules:
- Never invent components, props, types or default values. If no tool \
output mentions something, say that you could not find it.
- When get_component_details reports components under notFound, tell the \
user those components do not exist in the library.
- If asked for something outside the library's documentation, or for a \
capability you do not have (running code, accessing other systems), decline \
plainly and point the user to what you can help with.
- Keep answers concise and include short code examples when they help.";

/// Creates agents with the standard instruction and a given tool set.
pub struct AgentFactory {
    providers: Arc<dyn ProviderFactory>,
    model: ModelConfig,
}

impl AgentFactory {
    pub fn new(providers: Arc<dyn ProviderFactory>, model: ModelConfig) -> Self {
        Self { providers, model }
    }

    pub fn model(&self) -> &ModelConfig {
        &self.model
    }

    /// Build a new agent bound to `tools`. Nothing is cached.
    pub fn build(&self, tools: Vec<SharedTool>) -> Result<Agent, DocentError> {
        let provider = self.providers.create(&self.model)?;
        let settings = GenerationSettings::builder()
            .maybe_temperature(self.model.temperature)
            .maybe_max_tokens(self.model.max_tokens)
            .build();

        Ok(Agent::new(provider)
            .with_system_prompt(SYSTEM_INSTRUCTION)
            .with_tools(tools)
            .with_settings(settings))
    }

    /// Build an agent for a session.
    pub fn build_for_session(
        &self,
        session_id: &str,
        tools: Vec<SharedTool>,
    ) -> Result<Agent, DocentError> {
        Ok(self.build(tools)?.with_session_id(session_id))
    }
}

impl std::fmt::Debug for AgentFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentFactory")
            .field("model", &self.model)
            .finish()
    }
}
