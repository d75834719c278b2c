//! HTTP surface: query endpoints, health and process wiring.

pub mod logging;
mod routes;

use std::sync::Arc;

use tracing::{info, warn};

use crate::adapters::RemoteTools;
use crate::agent::AgentFactory;
use crate::channel::{transport_from_config, RemoteToolNames, ToolChannel};
use crate::config::DocentConfig;
use crate::dispatch::QueryDispatcher;
use crate::error::DocentError;
use crate::provider::ProviderFactory;
use crate::retrieval::{HttpIndexLoader, SharedIndex};
use crate::session::{EvictionPolicy, SessionCache};

pub use routes::{router, SESSION_HEADER};

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: QueryDispatcher,
    pub channel: Arc<ToolChannel>,
    pub index: Arc<SharedIndex>,
}

impl AppState {
    /// Wire the tool channel, index, agent factory and session cache from
    /// configuration. Nothing connects or loads yet.
    pub fn from_config(config: &DocentConfig, providers: Arc<dyn ProviderFactory>) -> Self {
        let channel = Arc::new(ToolChannel::new(
            transport_from_config(&config.tool_server),
            RemoteToolNames::from(&config.tool_server),
        ));
        let index = Arc::new(SharedIndex::new(Box::new(HttpIndexLoader::new(
            config.retrieval.endpoint.clone(),
        ))));
        Self::assemble(config, providers, channel, index)
    }

    /// Like [`from_config`](Self::from_config) with a caller-supplied
    /// channel and index.
    pub fn assemble(
        config: &DocentConfig,
        providers: Arc<dyn ProviderFactory>,
        channel: Arc<ToolChannel>,
        index: Arc<SharedIndex>,
    ) -> Self {
        let factory = AgentFactory::new(providers, config.model.clone());
        let remote: Arc<dyn RemoteTools> = channel.clone();
        let sessions = SessionCache::new(
            factory,
            Arc::clone(&index),
            remote,
            EvictionPolicy::from(&config.sessions),
        )
        .with_top_k(config.retrieval.top_k);

        Self {
            dispatcher: QueryDispatcher::new(sessions),
            channel,
            index,
        }
    }

    pub fn sessions(&self) -> &SessionCache {
        self.dispatcher.sessions()
    }

    /// Start background work. With `eager_index` the index is built now;
    /// a failure is logged and retried on the first query.
    pub async fn start(&self, eager_index: bool) {
        self.sessions().start_eviction().await;
        if eager_index {
            if let Err(e) = self.index.get().await {
                warn!(error = %e, "eager index build failed; will retry on first query");
            }
        }
    }

    pub async fn shutdown(&self) {
        self.sessions().shutdown().await;
        self.channel.disconnect().await;
    }
}

/// Serve until Ctrl-C, then shut everything down.
pub async fn serve(state: AppState, bind: &str) -> Result<(), DocentError> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "docent listening");

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    state.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
