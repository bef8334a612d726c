use serde::{Deserialize, Serialize};

use super::User;

fn bearer() -> String {
    "bearer".to_string()
}

/// Access/refresh token pair. Both tokens are opaque to the client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "bearer")]
    pub token_type: String,
}

// Tokens stay out of Debug output so they never reach the logs
impl std::fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .finish()
    }
}

impl AuthTokens {
    pub fn bearer(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: bearer(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: AuthTokens,
    #[serde(flatten)]
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentSignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub number: Option<String>,
    pub major: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentSignupResponse {
    #[serde(flatten)]
    pub tokens: AuthTokens,
    #[serde(flatten)]
    pub user: User,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub major: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstructorSignupRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub department: Option<String>,
    pub office_location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstructorSignupResponse {
    #[serde(flatten)]
    pub tokens: AuthTokens,
    #[serde(flatten)]
    pub user: User,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub office_location: Option<String>,
}

/// Responses that open a session: a token pair plus the account it belongs to.
pub trait SessionGrant {
    fn tokens(&self) -> &AuthTokens;
    fn user(&self) -> &User;
}

macro_rules! impl_session_grant {
    ($($ty:ty),+) => {
        $(
            impl SessionGrant for $ty {
                fn tokens(&self) -> &AuthTokens {
                    &self.tokens
                }

                fn user(&self) -> &User {
                    &self.user
                }
            }
        )+
    };
}

impl_session_grant!(LoginResponse, StudentSignupResponse, InstructorSignupResponse);

#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}
