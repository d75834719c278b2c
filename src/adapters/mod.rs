//! Agent-callable wrappers around the tool channel operations.
//!
//! Adapters never fail a tool call. Every outcome, including an unreachable
//! tool server, is reported as a [`ToolEnvelope`] so the agent can fall back
//! to other tools within the same turn.

mod details;
mod envelope;
mod list;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::channel::{RemoteOperation, ToolChannel};
use crate::error::DocentError;
use crate::tools::SharedTool;

pub use details::{partition_details, ComponentDetailsTool, DETAILS_TOOL_NAME};
pub use envelope::ToolEnvelope;
pub use list::{ListComponentsTool, LIST_TOOL_NAME};

/// What adapters need from the tool channel.
#[async_trait]
pub trait RemoteTools: Send + Sync {
    fn is_ready(&self) -> bool;

    async fn connect(&self) -> Result<(), DocentError>;

    async fn call(&self, operation: RemoteOperation, arguments: Value)
        -> Result<Value, DocentError>;
}

#[async_trait]
impl RemoteTools for ToolChannel {
    fn is_ready(&self) -> bool {
        ToolChannel::is_ready(self)
    }

    async fn connect(&self) -> Result<(), DocentError> {
        ToolChannel::connect(self).await
    }

    async fn call(
        &self,
        operation: RemoteOperation,
        arguments: Value,
    ) -> Result<Value, DocentError> {
        ToolChannel::call(self, operation, arguments).await
    }
}

/// Both remote adapters, sharing one channel.
pub fn remote_tools(remote: Arc<dyn RemoteTools>) -> Vec<SharedTool> {
    vec![
        Arc::new(ListComponentsTool::new(Arc::clone(&remote))),
        Arc::new(ComponentDetailsTool::new(remote)),
    ]
}

/// Make one connect attempt when the channel is down.
async fn ensure_ready(remote: &dyn RemoteTools) -> Result<(), DocentError> {
    if remote.is_ready() {
        return Ok(());
    }
    debug!("tool channel not ready, attempting connect");
    remote.connect().await
}
