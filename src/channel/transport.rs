//! How the channel reaches the tool server.

use async_trait::async_trait;
use rmcp::model::ClientInfo;
use rmcp::service::{ClientInitializeError, DynService, RoleClient, RunningService, ServiceExt};
use rmcp::transport::TokioChildProcess;
use tokio::process::Command;

use crate::config::ToolServerConfig;

pub type DynClientService = Box<dyn DynService<RoleClient>>;
pub type ChannelService = RunningService<RoleClient, DynClientService>;

/// Produces initialized MCP sessions with the tool server.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Start the server (if needed) and complete the MCP handshake.
    async fn connect(&self, client_info: ClientInfo)
        -> Result<ChannelService, ClientInitializeError>;

    /// Human-readable target, for logs.
    fn describe(&self) -> String;
}

/// Spawns the tool server as a child process and talks MCP over its stdio.
#[derive(Debug, Clone)]
pub struct StdioTransport {
    command: String,
    args: Vec<String>,
}

impl StdioTransport {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl ChannelTransport for StdioTransport {
    async fn connect(
        &self,
        client_info: ClientInfo,
    ) -> Result<ChannelService, ClientInitializeError> {
        let mut command = Command::new(&self.command);
        command.args(&self.args);
        let transport = TokioChildProcess::new(command).map_err(|error| {
            ClientInitializeError::transport::<TokioChildProcess>(error, "spawn tool server")
        })?;

        client_info.into_dyn().serve(transport).await
    }

    fn describe(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Used when no tool server command is configured; every connect fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredTransport;

#[async_trait]
impl ChannelTransport for UnconfiguredTransport {
    async fn connect(
        &self,
        _client_info: ClientInfo,
    ) -> Result<ChannelService, ClientInitializeError> {
        Err(ClientInitializeError::ConnectionClosed(
            "no tool server command configured".into(),
        ))
    }

    fn describe(&self) -> String {
        "<unconfigured>".into()
    }
}

/// Pick the transport for a tool server configuration.
pub fn transport_from_config(config: &ToolServerConfig) -> Box<dyn ChannelTransport> {
    match config.command.as_deref().map(str::trim) {
        Some(command) if !command.is_empty() => {
            Box::new(StdioTransport::new(command, config.args.clone()))
        }
        _ => Box::new(UnconfiguredTransport),
    }
}
