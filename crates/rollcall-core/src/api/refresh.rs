//! Single-flight coordination for token refresh.
//!
//! The gate belongs to the `SessionStore`, so every `ApiClient` built over
//! one session shares it.
//! Any number of requests can discover an expired access token at once.
//! The first one starts the refresh and parks a shared handle in the gate;
//! everyone arriving before it settles awaits that same handle. Once the
//! refresh settles the slot is emptied, so the next 401 starts a new cycle.
//! With rotating refresh tokens, two overlapping refresh calls would revoke
//! each other's result.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use crate::models::AuthTokens;

type PendingRefresh = Shared<BoxFuture<'static, Option<AuthTokens>>>;

#[derive(Default)]
pub(crate) struct RefreshGate {
    pending: Mutex<Option<PendingRefresh>>,
    cycles: AtomicU64,
}

impl fmt::Debug for RefreshGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshGate")
            .field("cycles", &self.cycles())
            .finish_non_exhaustive()
    }
}

impl RefreshGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of refresh cycles started through this gate
    pub(crate) fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Join the in-flight refresh, or start one with `start` if none is running.
    ///
    /// The check and the install happen under one lock with no await in
    /// between; `start` is only called by the caller that installs.
    pub(crate) async fn run<F>(self: &Arc<Self>, start: F) -> Option<AuthTokens>
    where
        F: FnOnce() -> BoxFuture<'static, Option<AuthTokens>>,
    {
        let pending = {
            let mut slot = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(pending) => {
                    debug!("Joining in-flight token refresh");
                    pending.clone()
                }
                None => {
                    let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(cycle, "Starting token refresh");
                    let gate = Arc::clone(self);
                    let refresh = start();
                    let pending = async move {
                        let tokens = refresh.await;
                        gate.settle();
                        tokens
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    fn settle(&self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    #[cfg(test)]
    fn in_flight(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
