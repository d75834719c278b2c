//! Entry point for answering queries.

use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::error::DocentError;
use crate::session::SessionCache;

/// Text fragments of a streamed answer, in arrival order.
///
/// Lazy, finite and single-use. An `Err` item ends the stream.
pub type FragmentStream = BoxStream<'static, Result<String, DocentError>>;

/// Routes a query to the agent of its session.
#[derive(Debug, Clone)]
pub struct QueryDispatcher {
    sessions: SessionCache,
}

impl QueryDispatcher {
    pub fn new(sessions: SessionCache) -> Self {
        Self { sessions }
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    /// Answer `text` in one piece.
    pub async fn query(&self, session_id: &str, text: &str) -> Result<String, DocentError> {
        let agent = self.sessions.get_or_create(session_id).await?;
        debug!(session_id, "dispatching query");
        agent.execute(text).await.map_err(|e| {
            warn!(session_id, error = %e, "query failed");
            DocentError::agent_invocation(e)
        })
    }

    /// Answer `text` as a stream of fragments. Empty fragments are skipped.
    pub async fn stream_query(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<FragmentStream, DocentError> {
        let agent = self.sessions.get_or_create(session_id).await?;
        debug!(session_id, "dispatching streamed query");
        let stream = agent
            .stream(text)
            .filter_map(|item| async move {
                match item {
                    Ok(fragment) if fragment.is_empty() => None,
                    Ok(fragment) => Some(Ok(fragment)),
                    Err(e) => Some(Err(DocentError::agent_invocation(e))),
                }
            });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::FakeRemote;
    use crate::agent::AgentFactory;
    use crate::config::ModelConfig;
    use crate::provider::test_support::{ScriptedFactory, ScriptedProvider};
    use crate::retrieval::{Passage, RetrievalIndex, SharedIndex};
    use crate::session::EvictionPolicy;
    use async_trait::async_trait;
    use futures::TryStreamExt;
    use std::sync::Arc;

    struct NoDocs;

    #[async_trait]
    impl RetrievalIndex for NoDocs {
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<Passage>, DocentError> {
            Ok(Vec::new())
        }
    }

    fn dispatcher(provider: ScriptedProvider) -> QueryDispatcher {
        let factory = AgentFactory::new(
            Arc::new(ScriptedFactory(Arc::new(provider))),
            ModelConfig::default(),
        );
        QueryDispatcher::new(SessionCache::new(
            factory,
            Arc::new(SharedIndex::ready(Arc::new(NoDocs))),
            Arc::new(FakeRemote::unreachable()),
            EvictionPolicy::default(),
        ))
    }

    #[tokio::test]
    async fn query_returns_answer() {
        let dispatcher = dispatcher(ScriptedProvider::new(vec![ScriptedProvider::text(
            "Use variant=\"ghost\".",
        )]));

        let answer = dispatcher.query("u1", "ghost button?").await.unwrap();

        assert_eq!(answer, "Use variant=\"ghost\".");
        assert!(dispatcher.sessions().contains("u1"));
    }

    #[tokio::test]
    async fn agent_failures_are_wrapped() {
        let dispatcher = dispatcher(ScriptedProvider::failing(DocentError::api(503, "overloaded")));

        let err = dispatcher.query("u1", "hi").await.unwrap_err();

        assert!(matches!(err, DocentError::AgentInvocation(inner) if matches!(*inner, DocentError::Api { status: 503, .. })));
    }

    #[tokio::test]
    async fn stream_skips_empty_fragments() {
        let dispatcher = dispatcher(ScriptedProvider::new(vec![ScriptedProvider::text(
            "Buttons  trigger actions",
        )]));

        let fragments: Vec<String> = dispatcher
            .stream_query("u1", "buttons?")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert!(fragments.iter().all(|f| !f.is_empty()));
        assert_eq!(fragments.concat(), "Buttons  trigger actions");
    }
}
