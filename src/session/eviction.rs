//! Idle eviction: policy, delay queue and the background loop draining it.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SessionConfig;

/// When sessions count as idle, and how long after an access it is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    pub idle_ttl: Duration,
    pub check_delay: Duration,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for EvictionPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            idle_ttl: config.idle_ttl(),
            check_delay: config.check_delay(),
        }
    }
}

/// Far enough out to stand in for "never"; used when a deadline overflows.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// `base + delay`, saturating to a far-future instant instead of panicking.
pub(super) fn deadline(base: Instant, delay: Duration) -> Instant {
    base.checked_add(delay)
        .or_else(|| base.checked_add(FAR_FUTURE))
        .unwrap_or(base)
}

/// Min-heap of `(check_at, session_id)`.
#[derive(Debug, Default)]
pub(super) struct DelayQueue {
    heap: BinaryHeap<Reverse<(Instant, String)>>,
}

impl DelayQueue {
    pub(super) fn push(&mut self, at: Instant, session_id: String) {
        self.heap.push(Reverse((at, session_id)));
    }

    pub(super) fn next_due(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse((at, _))| *at)
    }

    /// Pop the earliest check if it is due at `now`.
    pub(super) fn pop_due(&mut self, now: Instant) -> Option<String> {
        match self.heap.peek() {
            Some(Reverse((at, _))) if *at <= now => self.heap.pop().map(|Reverse((_, id))| id),
            _ => None,
        }
    }

    pub(super) fn clear(&mut self) {
        self.heap.clear();
    }

    pub(super) fn len(&self) -> usize {
        self.heap.len()
    }
}

/// Something with due checks to run.
pub(super) trait DueChecks: Send + Sync + 'static {
    fn next_due(&self) -> Option<Instant>;
    fn process_due(&self) -> usize;
    fn wakeup(&self) -> Arc<Notify>;
}

/// Handle to the single background task draining the delay queue.
///
/// The task only holds a weak reference to its checks and is cancelled when
/// the handle is dropped, so it never keeps the cache alive.
#[derive(Debug)]
pub struct EvictionLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl EvictionLoop {
    pub(super) fn spawn<C: DueChecks>(checks: &Arc<C>) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(Arc::downgrade(checks), cancel.clone()));
        Self { cancel, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop the loop and wait for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.handle).await {
            warn!(error = %e, "eviction loop ended abnormally");
        }
    }
}

impl Drop for EvictionLoop {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run<C: DueChecks>(checks: Weak<C>, cancel: CancellationToken) {
    debug!("eviction loop started");
    loop {
        // Never hold a strong reference across an await.
        let Some((next, wakeup)) = checks.upgrade().map(|c| (c.next_due(), c.wakeup())) else {
            break;
        };
        let sleep = async move {
            match next {
                Some(at) => time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(sleep);

        tokio::select! {
            _ = cancel.cancelled() => break,
            // A new check was scheduled; recompute the deadline.
            _ = wakeup.notified() => {}
            _ = &mut sleep => {
                let Some(checks) = checks.upgrade() else {
                    break;
                };
                let evicted = checks.process_due();
                if evicted > 0 {
                    debug!(evicted, "idle sessions evicted");
                }
            }
        }
    }
    debug!("eviction loop stopped");
}
