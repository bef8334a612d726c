//! REST API client module for the rollcall backend.
//!
//! This module provides the `ApiClient` for issuing authenticated requests.
//! Requests carry the stored access token as a bearer credential; expired
//! tokens are refreshed once, shared by every request that hit the 401.

pub mod client;
pub mod error;
pub(crate) mod refresh;

pub use client::{ApiClient, RequestOptions, REFRESH_PATH};
pub use error::ApiError;
pub use reqwest::Method;
