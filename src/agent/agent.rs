//! Agent: a model, a tool set, a system prompt and a conversation.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use super::conversation::Conversation;
use crate::error::DocentError;
use crate::generation::{generate_text, stream_text_with_tools, TurnEvent};
use crate::provider::ModelProvider;
use crate::tools::{SharedTool, ToolExecutionContext};
use crate::types::*;

/// A conversational agent bound to one session.
///
/// Turns take `&self`: the history is snapshotted when a turn starts and the
/// turn's messages are appended when it completes. Failed turns leave the
/// history untouched.
pub struct Agent {
    provider: Arc<dyn ModelProvider>,
    system_prompt: Option<String>,
    tools: Vec<SharedTool>,
    settings: GenerationSettings,
    conversation: Conversation,
    session_id: Option<String>,
}

impl Agent {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self {
            provider,
            system_prompt: None,
            tools: Vec::new(),
            settings: GenerationSettings::default(),
            conversation: Conversation::new(),
            session_id: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_tool(mut self, tool: SharedTool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = SharedTool>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Attach the session this agent serves; passed to tools.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Answer a message, running tools as needed.
    pub async fn execute(&self, message: impl Into<String>) -> Result<String, DocentError> {
        self.execute_detailed(message).await.map(|result| result.text)
    }

    /// Like [`execute`](Self::execute), returning the full turn result
    /// including every tool invocation.
    pub async fn execute_detailed(
        &self,
        message: impl Into<String>,
    ) -> Result<GenerateTextResult, DocentError> {
        let user = ModelMessage::user(message);
        let messages = self.prompt(&user);

        let result = generate_text(
            self.provider.as_ref(),
            messages,
            self.settings.clone(),
            &self.tools,
            &self.context(),
        )
        .await?;

        debug!(
            session_id = ?self.session_id,
            tool_calls = result.invocations.len(),
            "turn completed"
        );
        self.conversation.record_turn(user, result.messages.clone());
        Ok(result)
    }

    /// Answer a message as a stream of text fragments.
    ///
    /// Nothing happens until the stream is polled. The turn is recorded in
    /// the history once the stream has been driven to the end.
    pub fn stream(&self, message: impl Into<String>) -> BoxStream<'static, Result<String, DocentError>> {
        let user = ModelMessage::user(message);
        let messages = self.prompt(&user);
        let mut events = stream_text_with_tools(
            Arc::clone(&self.provider),
            messages,
            self.settings.clone(),
            self.tools.clone(),
            self.context(),
        );
        let conversation = self.conversation.clone();
        let session_id = self.session_id.clone();

        Box::pin(async_stream::stream! {
            while let Some(event) = events.next().await {
                match event {
                    Ok(TurnEvent::TextDelta(text)) => yield Ok(text),
                    Ok(TurnEvent::ToolInvoked(invocation)) => {
                        debug!(session_id = ?session_id, tool = %invocation.call.name, "tool invoked");
                    }
                    Ok(TurnEvent::Completed(result)) => {
                        conversation.record_turn(user.clone(), result.messages);
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        })
    }

    fn prompt(&self, user: &ModelMessage) -> Vec<ModelMessage> {
        let mut messages = Vec::new();
        if let Some(ref sys) = self.system_prompt {
            messages.push(ModelMessage::system(sys.clone()));
        }
        messages.extend(self.conversation.snapshot());
        messages.push(user.clone());
        messages
    }

    fn context(&self) -> ToolExecutionContext {
        ToolExecutionContext {
            session_id: self.session_id.clone(),
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("model", &self.provider.model_id())
            .field("tools", &self.tool_names())
            .field("session_id", &self.session_id)
            .finish()
    }
}
