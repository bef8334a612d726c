//! rollcall-core - client core for the rollcall class-attendance service.
//!
//! The crate is organized leaf-first:
//!
//! - `vault`: persistent storage for the access/refresh token pair
//! - `session`: observable session state and the route guard
//! - `api`: the authenticated request pipeline with shared token refresh
//! - `auth`: login, registration, logout and manual refresh
//! - `forms`: local validation run before any auth request
//! - `config`: settings from the config file and environment
//!
//! Screens hold an `Arc<SessionStore>` to render from and an `AuthService`
//! or `ApiClient` to act through:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rollcall_core::{ApiClient, AuthService, SessionStore, Vault};
//!
//! # async fn run() -> Result<(), rollcall_core::ApiError> {
//! let session = Arc::new(SessionStore::new(Vault::in_memory()));
//! session.hydrate().await;
//! let api = ApiClient::new(Some("https://api.example.edu".to_string()), session)?;
//! let auth = AuthService::new(api);
//! auth.login("a@b.com", "secret123").await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod forms;
pub mod models;
pub mod session;
pub mod vault;

pub use api::{ApiClient, ApiError, Method, RequestOptions};
pub use auth::AuthService;
pub use config::Config;
pub use forms::ValidationError;
pub use models::{AuthTokens, User, UserRole};
pub use session::{route_decision, RouteDecision, Session, SessionStore};
pub use vault::{Vault, VaultBackend, VaultError};
