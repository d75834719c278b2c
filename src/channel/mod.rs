//! Process-wide channel to the component metadata tool server.
//!
//! The server runs as a sibling process spoken to over MCP on stdio. It
//! exposes exactly two operations, see [`RemoteOperation`].

mod client;
pub mod transport;

use serde::Serialize;
use strum::{Display, EnumString};

use crate::config::ToolServerConfig;

pub use client::ToolChannel;
pub use transport::{
    transport_from_config, ChannelService, ChannelTransport, StdioTransport, UnconfiguredTransport,
};

/// Connection state of the tool channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connected,
    /// The last connect or call failed at the transport level. The next
    /// `connect` retries.
    Failed,
}

/// Operations offered by the tool server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum RemoteOperation {
    /// Enumerate every component. Takes no arguments.
    ListComponents,
    /// Details for a batch of components, argument `{"componentNames": [..]}`.
    ComponentDetails,
}

/// Remote tool names backing each [`RemoteOperation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteToolNames {
    pub list_components: String,
    pub component_details: String,
}

impl RemoteToolNames {
    pub fn resolve(&self, operation: RemoteOperation) -> &str {
        match operation {
            RemoteOperation::ListComponents => &self.list_components,
            RemoteOperation::ComponentDetails => &self.component_details,
        }
    }
}

impl Default for RemoteToolNames {
    fn default() -> Self {
        Self::from(&ToolServerConfig::default())
    }
}

impl From<&ToolServerConfig> for RemoteToolNames {
    fn from(config: &ToolServerConfig) -> Self {
        Self {
            list_components: config.list_tool.clone(),
            component_details: config.details_tool.clone(),
        }
    }
}
