use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::{ApiClient, ApiError, RequestOptions};
use crate::models::{
    AuthTokens, InstructorSignupRequest, InstructorSignupResponse, LoginRequest, LoginResponse,
    SessionGrant, StudentSignupRequest, StudentSignupResponse,
};
use crate::session::SessionStore;

const LOGIN_PATH: &str = "/auth/login";
const STUDENT_SIGNUP_PATH: &str = "/auth/signup/student";
const INSTRUCTOR_SIGNUP_PATH: &str = "/auth/signup/instructor";
const LOGOUT_PATH: &str = "/auth/logout";

/// User-facing auth actions built on the API client and session store.
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        self.api.session()
    }

    /// Post credentials to an unauthenticated endpoint, then store the
    /// issued tokens and the returned user.
    async fn sign_in<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned + SessionGrant,
    {
        let response: R = self
            .api
            .post(path, body, RequestOptions::unauthenticated())
            .await?;

        self.session().set_tokens(response.tokens()).await?;
        let user = response.user().clone();
        info!(user_id = %user.id, role = %user.role, path, "Signed in");
        self.session().set_user(user);
        Ok(response)
    }

    /// Log in with email and password
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.sign_in(LOGIN_PATH, &body)
            .await
            .inspect_err(|e| error!(error = %e, "Login failed"))
    }

    /// Create a student account and sign in as it
    pub async fn register_student(
        &self,
        request: &StudentSignupRequest,
    ) -> Result<StudentSignupResponse, ApiError> {
        self.sign_in(STUDENT_SIGNUP_PATH, request)
            .await
            .inspect_err(|e| error!(error = %e, "Student registration failed"))
    }

    /// Create an instructor account and sign in as it
    pub async fn register_instructor(
        &self,
        request: &InstructorSignupRequest,
    ) -> Result<InstructorSignupResponse, ApiError> {
        self.sign_in(INSTRUCTOR_SIGNUP_PATH, request)
            .await
            .inspect_err(|e| error!(error = %e, "Instructor registration failed"))
    }

    /// Sign out.
    ///
    /// The server is told first, but only as a courtesy: its failure is
    /// logged and ignored. Local tokens and session are always cleared.
    pub async fn logout(&self) -> Result<(), ApiError> {
        if let Err(e) = self
            .api
            .request(Method::POST, LOGOUT_PATH, RequestOptions::new())
            .await
        {
            warn!(error = %e, "Server logout failed");
        }
        self.session().clear_auth().await?;
        Ok(())
    }

    /// Refresh the token pair on demand, outside the shared refresh path.
    ///
    /// On failure returns `ApiError::RefreshFailed` and leaves the session
    /// as it was. On success the new pair replaces the stored one.
    pub async fn refresh_tokens(&self) -> Result<AuthTokens, ApiError> {
        let refresh_token = self
            .session()
            .vault()
            .refresh_token()
            .await?
            .ok_or_else(|| ApiError::RefreshFailed("no refresh token stored".to_string()))?;

        let tokens = self
            .api
            .exchange_refresh_token(&refresh_token)
            .await
            .map_err(|e| {
                warn!(error = %e, "Manual token refresh failed");
                ApiError::RefreshFailed(e.to_string())
            })?;

        self.session().vault().store_tokens(&tokens).await?;
        info!("Tokens refreshed on request");
        Ok(tokens)
    }
}
