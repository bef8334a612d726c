//! Session state for the running process.
//!
//! This module provides:
//! - `Session`: the current user plus the `authenticated` / `hydrated` flags
//! - `SessionStore`: the observable container that owns the token vault
//! - `guard`: the route decision screens use to gate on the session
//!
//! Only the tokens are persisted. On start the store reports
//! `authenticated` purely from token presence; a stale token is discovered
//! by the first request that comes back 401.

pub mod guard;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::refresh::RefreshGate;
use crate::models::{AuthTokens, User};
use crate::vault::{Vault, VaultError};

pub use guard::{route_decision, RouteDecision};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Session {
    pub user: Option<User>,
    pub authenticated: bool,
    /// Set once the vault has been consulted after process start
    pub hydrated: bool,
}

impl Session {
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }
}

/// Observable session container.
///
/// Share it as `Arc<SessionStore>` between the API clients and whatever
/// renders the session; every mutation is published to subscribers.
/// The store also owns the refresh gate, so at most one token refresh is
/// in flight per session no matter how many clients use it.
#[derive(Debug)]
pub struct SessionStore {
    vault: Vault,
    state: watch::Sender<Session>,
    refresh: Arc<RefreshGate>,
}

impl SessionStore {
    pub fn new(vault: Vault) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            vault,
            state,
            refresh: Arc::new(RefreshGate::new()),
        }
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    pub(crate) fn refresh_gate(&self) -> &Arc<RefreshGate> {
        &self.refresh
    }

    /// Number of shared token refreshes started for this session
    pub fn refresh_cycles(&self) -> u64 {
        self.refresh.cycles()
    }

    /// Copy of the current session
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().authenticated
    }

    /// Receiver that observes every future session change
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Resolve once `hydrate` has run, returning the hydrated session
    pub async fn wait_hydrated(&self) -> Session {
        let mut rx = self.subscribe();
        while !rx.borrow_and_update().hydrated {
            // The sender lives in self, so the channel cannot close here
            if rx.changed().await.is_err() {
                break;
            }
        }
        self.snapshot()
    }

    /// Record the signed-in user. Does not touch the vault.
    pub fn set_user(&self, user: User) {
        debug!(user_id = %user.id, role = %user.role, "Session user set");
        self.state.send_modify(|s| {
            s.user = Some(user);
            s.authenticated = true;
        });
    }

    /// Persist a token pair, then mark the session authenticated
    pub async fn set_tokens(&self, tokens: &AuthTokens) -> Result<(), VaultError> {
        self.vault.store_tokens(tokens).await?;
        self.state.send_modify(|s| s.authenticated = true);
        Ok(())
    }

    /// Wipe stored tokens and sign the session out.
    ///
    /// The in-memory session is reset even when the vault cannot be
    /// cleared; the vault error is still returned.
    pub async fn clear_auth(&self) -> Result<(), VaultError> {
        let cleared = self.vault.clear_all().await;
        self.state.send_modify(|s| {
            s.user = None;
            s.authenticated = false;
        });
        match cleared {
            Ok(()) => {
                info!("Session cleared");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Session cleared but stored tokens could not be removed");
                Err(e)
            }
        }
    }

    /// Derive `authenticated` from the stored tokens and mark the session hydrated.
    ///
    /// Never fails: a vault read error leaves the session signed out but
    /// still hydrated, so nothing waiting on hydration hangs.
    pub async fn hydrate(&self) {
        let authenticated = match self.vault.tokens().await {
            Ok(tokens) => tokens.is_some(),
            Err(e) => {
                error!(error = %e, "Failed to hydrate auth state");
                false
            }
        };
        self.state.send_modify(|s| {
            s.authenticated = authenticated;
            s.hydrated = true;
        });
        debug!(authenticated, backend = self.vault.backend_name(), "Session hydrated");
    }
}
