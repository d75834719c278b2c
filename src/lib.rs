//! docent: a session-scoped documentation agent for component libraries.
//!
//! Each caller-supplied session id gets its own agent, built on first use
//! and evicted once idle. Agents answer from two kinds of tools: a
//! documentation retrieval index (always present) and an authoritative
//! component metadata server reached over MCP (present when reachable).
//!
//! ```no_run
//! use std::sync::Arc;
//! use docent::config::DocentConfig;
//! use docent::provider::DefaultProviderFactory;
//! use docent::server::AppState;
//!
//! # async fn example() -> docent::error::Result<()> {
//! let config = DocentConfig::load(None)?;
//! let state = AppState::from_config(&config, Arc::new(DefaultProviderFactory));
//! let answer = state.dispatcher.query("user-1", "Which props does Button take?").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod agent;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod generation;
pub mod prelude;
pub mod provider;
pub mod retrieval;
pub mod session;
pub mod tools;
pub mod types;

#[cfg(feature = "server")]
pub mod cli;

#[cfg(feature = "server")]
pub mod server;
