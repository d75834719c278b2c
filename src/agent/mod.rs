//! The per-session documentation agent.

#[allow(clippy::module_inception)]
mod agent;
mod conversation;
pub mod factory;

pub use agent::Agent;
pub use conversation::Conversation;
pub use factory::{AgentFactory, SYSTEM_INSTRUCTION};
