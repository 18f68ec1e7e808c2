//! Fault-isolating session pool
//!
//! Every accepted connection runs as one task in a [`JoinSet`]. Whatever a
//! session does (succeed, fail, panic) is logged under its label and then
//! forgotten: it never reaches the accept loop or any sibling session.

use super::log::SessionLog;
use anyhow::Result;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Level;

/// Counters for the session pool
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Sessions started
    pub spawned: AtomicUsize,
    /// Sessions that ended without error
    pub completed: AtomicUsize,
    /// Sessions that ended with an error
    pub failed: AtomicUsize,
    /// Sessions that panicked
    pub panicked: AtomicUsize,
}

impl PoolStats {
    /// Create new pool stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current stats snapshot
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            spawned: self.spawned.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    /// Sessions started
    pub spawned: usize,
    /// Sessions that ended without error
    pub completed: usize,
    /// Sessions that ended with an error
    pub failed: usize,
    /// Sessions that panicked
    pub panicked: usize,
}

impl PoolStatsSnapshot {
    /// Sessions that have not finished yet
    pub fn active(&self) -> usize {
        self.spawned
            .saturating_sub(self.completed + self.failed + self.panicked)
    }
}

/// Pool of independent session tasks
pub struct SessionPool {
    sessions: JoinSet<()>,
    root: CancellationToken,
    log: Arc<dyn SessionLog>,
    stats: Arc<PoolStats>,
}

impl SessionPool {
    /// Create an empty pool
    pub fn new(log: Arc<dyn SessionLog>, stats: Arc<PoolStats>) -> Self {
        SessionPool {
            sessions: JoinSet::new(),
            root: CancellationToken::new(),
            log,
            stats,
        }
    }

    /// Start a session.
    ///
    /// `session` receives its own cancellation token, a child of the pool's.
    pub fn spawn<F, Fut>(&mut self, label: String, session: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let fut = session(self.root.child_token());
        let log = self.log.clone();
        let stats = self.stats.clone();

        stats.spawned.fetch_add(1, Ordering::Relaxed);
        self.sessions.spawn(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => {
                    stats.completed.fetch_add(1, Ordering::Relaxed);
                    log.record(&label, Level::DEBUG, "session finished", None);
                }
                Ok(Err(e)) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    log.record(&label, Level::WARN, "session failed", Some(&e));
                }
                Err(panic) => {
                    stats.panicked.fetch_add(1, Ordering::Relaxed);
                    let message = format!("session panicked: {}", panic_message(panic.as_ref()));
                    log.record(&label, Level::ERROR, &message, None);
                }
            }
        });
    }

    /// Number of sessions not yet reaped
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is running or waiting to be reaped
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Wait for the next session to finish and release it.
    ///
    /// Returns `false` when the pool is empty.
    pub async fn reap_next(&mut self) -> bool {
        match self.sessions.join_next().await {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                self.log.record(
                    "pool",
                    Level::ERROR,
                    &format!("session task did not complete: {}", e),
                    None,
                );
                true
            }
            None => false,
        }
    }

    /// Cancel every session and wait until all of them have ended
    pub async fn shutdown(mut self) {
        self.root.cancel();
        while self.reap_next().await {}
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}
