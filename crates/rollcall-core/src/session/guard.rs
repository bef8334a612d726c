//! Route gating on the session.
//!
//! Screens split into an auth group (login, registration) and everything
//! else. Until the session is hydrated no decision is made, which is what
//! keeps a splash screen up instead of flashing the login form.

use serde::Serialize;

use super::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum RouteDecision {
    /// Session not hydrated yet
    Pending,
    Allow,
    RedirectToLogin,
    /// Signed-in user landed on an auth screen
    RedirectHome,
}

pub fn route_decision(session: &Session, in_auth_group: bool) -> RouteDecision {
    if !session.hydrated {
        return RouteDecision::Pending;
    }
    match (session.authenticated, in_auth_group) {
        (false, false) => RouteDecision::RedirectToLogin,
        (true, true) => RouteDecision::RedirectHome,
        _ => RouteDecision::Allow,
    }
}
