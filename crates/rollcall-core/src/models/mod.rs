//! Data models for the rollcall API.
//!
//! This module contains the wire and domain types used by the client:
//!
//! - `User`, `UserRole`: the signed-in account
//! - `AuthTokens`: the bearer token pair
//! - Request/response envelopes for login, signup and refresh

pub mod auth;
pub mod user;

pub use auth::{
    AuthTokens, InstructorSignupRequest, InstructorSignupResponse, LoginRequest, LoginResponse,
    RefreshRequest, SessionGrant, StudentSignupRequest, StudentSignupResponse,
};
pub use user::{User, UserRole};
