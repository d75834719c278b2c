//! Session cache: one agent per session id, evicted once idle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::eviction::{deadline, DelayQueue, DueChecks, EvictionLoop, EvictionPolicy};
use crate::adapters::{remote_tools, RemoteTools};
use crate::agent::{Agent, AgentFactory};
use crate::error::DocentError;
use crate::retrieval::{RetrievalTool, SharedIndex};
use crate::tools::SharedTool;

/// A live session.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub agent: Arc<Agent>,
    pub last_activity: Instant,
    /// Checks for this session still sitting in the delay queue.
    pending_checks: usize,
}

#[derive(Default)]
struct CacheState {
    sessions: HashMap<String, SessionRecord>,
    queue: DelayQueue,
}

struct Inner {
    factory: AgentFactory,
    index: Arc<SharedIndex>,
    remote: Arc<dyn RemoteTools>,
    top_k: usize,
    policy: EvictionPolicy,
    state: Mutex<CacheState>,
    wakeup: Arc<Notify>,
    eviction: tokio::sync::Mutex<Option<EvictionLoop>>,
}

/// Maps session ids to agents.
///
/// Agents are built on first use with whatever tools are available at that
/// moment and are never rebuilt while the session lives. Every access pushes
/// an eviction check `check_delay` into the future; a check removes the
/// session once it has been idle for `idle_ttl`.
///
/// Cloning shares the same cache.
#[derive(Clone)]
pub struct SessionCache {
    inner: Arc<Inner>,
}

impl SessionCache {
    pub fn new(
        factory: AgentFactory,
        index: Arc<SharedIndex>,
        remote: Arc<dyn RemoteTools>,
        policy: EvictionPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                factory,
                index,
                remote,
                top_k: 5,
                policy,
                state: Mutex::new(CacheState::default()),
                wakeup: Arc::new(Notify::new()),
                eviction: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Passages requested per documentation search by default.
    ///
    /// Must be called before the cache is shared.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.top_k = top_k;
        }
        self
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.inner.policy
    }

    /// The agent for `session_id`, built on first use.
    ///
    /// Fails only when the retrieval index cannot be built. An unreachable
    /// tool server just yields an agent without the component tools.
    pub async fn get_or_create(&self, session_id: &str) -> Result<Arc<Agent>, DocentError> {
        if let Some(agent) = self.inner.touch(session_id) {
            return Ok(agent);
        }

        let agent = Arc::new(self.inner.provision(session_id).await?);
        Ok(self.inner.insert(session_id, agent))
    }

    /// Start the background eviction loop. Calling it again is a no-op.
    pub async fn start_eviction(&self) {
        let mut eviction = self.inner.eviction.lock().await;
        if eviction.as_ref().is_some_and(EvictionLoop::is_running) {
            return;
        }
        *eviction = Some(EvictionLoop::spawn(&self.inner));
        info!(
            idle_ttl_secs = self.inner.policy.idle_ttl.as_secs(),
            check_delay_secs = self.inner.policy.check_delay.as_secs(),
            "session eviction started"
        );
    }

    /// Stop the eviction loop and drop every session.
    pub async fn shutdown(&self) {
        if let Some(eviction) = self.inner.eviction.lock().await.take() {
            eviction.stop().await;
        }
        let mut state = self.inner.lock();
        let dropped = state.sessions.len();
        state.sessions.clear();
        state.queue.clear();
        info!(dropped, "session cache shut down");
    }

    /// Run every check that is due now. Returns how many sessions were
    /// evicted.
    pub fn process_due(&self) -> usize {
        self.inner.process_due()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.inner.lock().sessions.contains_key(session_id)
    }

    /// Look at a session without refreshing it.
    pub fn peek(&self, session_id: &str) -> Option<SessionRecord> {
        self.inner.lock().sessions.get(session_id).cloned()
    }

    /// Drop a session immediately.
    pub fn remove(&self, session_id: &str) -> Option<Arc<Agent>> {
        self.inner
            .lock()
            .sessions
            .remove(session_id)
            .map(|record| record.agent)
    }

    /// Checks waiting in the delay queue.
    pub fn pending_checks(&self) -> usize {
        self.inner.lock().queue.len()
    }
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache")
            .field("sessions", &self.len())
            .field("policy", &self.inner.policy)
            .finish()
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Refresh an existing session and schedule its next check.
    fn touch(&self, session_id: &str) -> Option<Arc<Agent>> {
        let now = Instant::now();
        let agent = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let record = state.sessions.get_mut(session_id)?;
            record.last_activity = now;
            record.pending_checks += 1;
            state
                .queue
                .push(deadline(now, self.policy.check_delay), session_id.to_string());
            Arc::clone(&record.agent)
        };
        self.wakeup.notify_one();
        Some(agent)
    }

    /// Store a freshly built agent. If another caller won the race the
    /// stored agent is kept and returned instead.
    fn insert(&self, session_id: &str, agent: Arc<Agent>) -> Arc<Agent> {
        let now = Instant::now();
        let stored = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let record = state
                .sessions
                .entry(session_id.to_string())
                .or_insert_with(|| {
                    debug!(session_id, "session created");
                    SessionRecord {
                        agent,
                        last_activity: now,
                        pending_checks: 0,
                    }
                });
            record.last_activity = now;
            record.pending_checks += 1;
            state
                .queue
                .push(deadline(now, self.policy.check_delay), session_id.to_string());
            Arc::clone(&record.agent)
        };
        self.wakeup.notify_one();
        stored
    }

    async fn provision(&self, session_id: &str) -> Result<Agent, DocentError> {
        let index = self.index.get().await?;
        let mut tools: Vec<SharedTool> = vec![Arc::new(RetrievalTool::new(index, self.top_k))];

        if !self.remote.is_ready() {
            if let Err(e) = self.remote.connect().await {
                warn!(session_id, error = %e, "tool server unavailable, building agent without component tools");
            }
        }
        if self.remote.is_ready() {
            tools.extend(remote_tools(Arc::clone(&self.remote)));
        }

        self.factory.build_for_session(session_id, tools)
    }
}

impl DueChecks for Inner {
    fn next_due(&self) -> Option<Instant> {
        self.lock().queue.next_due()
    }

    fn process_due(&self) -> usize {
        let now = Instant::now();
        let ttl = self.policy.idle_ttl;
        let mut guard = self.lock();
        let state = &mut *guard;
        let mut evicted = 0;

        while let Some(session_id) = state.queue.pop_due(now) {
            let Some(record) = state.sessions.get_mut(&session_id) else {
                continue;
            };
            record.pending_checks = record.pending_checks.saturating_sub(1);

            if now.saturating_duration_since(record.last_activity) >= ttl {
                state.sessions.remove(&session_id);
                debug!(session_id, "idle session evicted");
                evicted += 1;
            } else if record.pending_checks == 0 {
                // Last check found it active; look again once it could be idle.
                record.pending_checks = 1;
                let at = deadline(record.last_activity, ttl);
                state.queue.push(at, session_id);
            }
        }

        evicted
    }

    fn wakeup(&self) -> Arc<Notify> {
        Arc::clone(&self.wakeup)
    }
}
