//! Authentication operations.
//!
//! This module provides `AuthService`, which implements login, student and
//! instructor registration, logout and on-demand token refresh on top of
//! the API client and the session store.

pub mod service;

pub use service::AuthService;
