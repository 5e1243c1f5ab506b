//! Coalescing of concurrent token refreshes.
//!
//! Two tasks can both see "no refresh running" before either starts one, so
//! the decision is made under a lock: the first caller flips `in_progress`
//! and becomes the leader, later callers park a oneshot sender in the wait
//! queue. The leader publishes its result to every waiter when it finishes,
//! or a failure if it is dropped midway.

use std::future::Future;
use std::sync::Mutex;
use tokio::sync::oneshot;

/// Outcome shared by every caller of one refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    /// The session is over; callers must not retry.
    Expired(String),
    /// The backend could not be reached; the session is kept.
    Network(String),
}

pub type RefreshResult = Result<String, RefreshFailure>;

#[derive(Default)]
struct GateState {
    in_progress: bool,
    waiters: Vec<oneshot::Sender<RefreshResult>>,
}

#[derive(Default)]
pub struct RefreshGate {
    state: Mutex<GateState>,
}

/// Releases the gate when the leader finishes or is cancelled.
struct Leader<'a> {
    gate: &'a RefreshGate,
    result: Option<RefreshResult>,
}

impl Drop for Leader<'_> {
    fn drop(&mut self) {
        let result = self
            .result
            .take()
            .unwrap_or_else(|| Err(RefreshFailure::Network("refresh was interrupted".into())));

        let waiters = {
            let mut state = self.gate.lock();
            state.in_progress = false;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether a refresh is currently running.
    pub fn in_progress(&self) -> bool {
        self.lock().in_progress
    }

    /// Run `refresh` unless one is already running, in which case wait for
    /// that one's result instead.
    pub async fn run<F, Fut>(&self, refresh: F) -> RefreshResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshResult>,
    {
        let waiter = {
            let mut state = self.lock();
            if state.in_progress {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.in_progress = true;
                None
            }
        };

        if let Some(rx) = waiter {
            tracing::debug!("Refresh already in flight, waiting for it");
            return rx.await.unwrap_or_else(|_| {
                Err(RefreshFailure::Network("refresh was interrupted".into()))
            });
        }

        let mut leader = Leader {
            gate: self,
            result: None,
        };
        let result = refresh().await;
        leader.result = Some(result.clone());
        result
    }
}
