//! API client for the rollcall backend.
//!
//! Every call goes through `ApiClient::request`, which attaches the stored
//! access token, and on a 401 joins the shared refresh and retries once
//! with the new token. If no new token pair can be obtained the session is
//! cleared and the call fails with `ApiError::SessionExpired`.

use std::sync::Arc;
use std::time::Duration;

use futures::future::FutureExt;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::ApiError;
use crate::models::{AuthTokens, RefreshRequest};
use crate::session::SessionStore;

// ============================================================================
// Constants
// ============================================================================

/// Endpoint that trades a refresh token for a new token pair
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Per-request options for `ApiClient::request`.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers; these override the default `Content-Type`
    pub headers: HeaderMap,
    pub body: Option<Value>,
    /// Send without a bearer token and never refresh on 401
    pub skip_auth: bool,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for endpoints that must not carry credentials (login, signup, refresh)
    pub fn unauthenticated() -> Self {
        Self {
            skip_auth: true,
            ..Self::default()
        }
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// API client for the rollcall backend.
/// Clone is cheap - clones share the connection pool and the session store.
/// Token refresh is coordinated through the session, so separately built
/// clients over one `SessionStore` never refresh concurrently.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Option<String>,
    session: Arc<SessionStore>,
}

impl ApiClient {
    /// Create a client with no request timeout
    pub fn new(base_url: Option<String>, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, session, None)
    }

    /// Create a client, optionally bounding every request by `timeout`
    pub fn with_timeout(
        base_url: Option<String>,
        session: Arc<SessionStore>,
        timeout: Option<Duration>,
    ) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        let base_url = base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        if base_url.is_none() {
            warn!("API base URL is not configured. API calls will fail.");
        }

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Number of shared refresh cycles started for this client's session
    pub fn refresh_cycles(&self) -> u64 {
        self.session.refresh_cycles()
    }

    fn url(&self, path: &str) -> Result<String, ApiError> {
        let base = self.base_url.as_deref().ok_or(ApiError::MissingBaseUrl)?;
        if path.starts_with('/') {
            Ok(format!("{}{}", base, path))
        } else {
            Ok(format!("{}/{}", base, path))
        }
    }

    fn bearer(token: &str) -> Result<HeaderValue, ApiError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            ApiError::InvalidRequest("access token is not a valid header value".to_string())
        })?;
        value.set_sensitive(true);
        Ok(value)
    }

    fn base_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<&[u8]>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut builder = self
            .client
            .request(method.clone(), url)
            .headers(headers.clone());
        if let Some(body) = body {
            builder = builder.body(body.to_vec());
        }

        let response = builder.send().await?;
        debug!(method = %method, url, status = response.status().as_u16(), "Response received");
        Ok(response)
    }

    /// Turn a response into the call's outcome.
    /// 204 and empty bodies yield `None`; non-2xx statuses become `ApiError::Http`.
    async fn read_response(response: reqwest::Response) -> Result<Option<Value>, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            debug!(
                status = status.as_u16(),
                body = %ApiError::truncate_body(&body),
                "Request failed"
            );
            return Err(ApiError::from_status(status, &body));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&body).map(Some).map_err(|e| {
            ApiError::InvalidResponse(format!(
                "{} in body: {}",
                e,
                ApiError::truncate_body(&body)
            ))
        })
    }

    fn decode<T: DeserializeOwned>(value: Option<Value>, path: &str) -> Result<T, ApiError> {
        serde_json::from_value(value.unwrap_or(Value::Null)).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e))
        })
    }

    /// Issue one logical request.
    ///
    /// Unless `skip_auth` is set, the stored access token is attached when
    /// there is one, and a 401 triggers the shared refresh followed by at
    /// most one retry. The retry's outcome is final.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Option<Value>, ApiError> {
        let url = self.url(path)?;
        let RequestOptions {
            headers: extra_headers,
            body,
            skip_auth,
        } = options;

        let mut headers = Self::base_headers();
        headers.extend(extra_headers);
        if !skip_auth {
            if let Some(token) = self.session.vault().access_token().await? {
                headers.insert(header::AUTHORIZATION, Self::bearer(&token)?);
            }
        }

        let body = body
            .map(|b| serde_json::to_vec(&b))
            .transpose()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let mut response = self.send(&method, &url, &headers, body.as_deref()).await?;

        if response.status() == StatusCode::UNAUTHORIZED && !skip_auth {
            debug!(method = %method, path, "Access token rejected, refreshing");
            match self.refresh_session_tokens().await {
                Some(tokens) => {
                    headers.insert(header::AUTHORIZATION, Self::bearer(&tokens.access_token)?);
                    response = self.send(&method, &url, &headers, body.as_deref()).await?;
                }
                None => {
                    if let Err(e) = self.session.clear_auth().await {
                        warn!(error = %e, "Failed to remove stored tokens after refresh failure");
                    }
                    info!(path, "Session expired");
                    return Err(ApiError::SessionExpired);
                }
            }
        }

        Self::read_response(response).await
    }

    // ===== Token Refresh =====

    /// Refresh through the gate so concurrent 401s share one refresh call
    async fn refresh_session_tokens(&self) -> Option<AuthTokens> {
        let client = self.clone();
        self.session
            .refresh_gate()
            .run(move || async move { client.refresh_from_vault().await }.boxed())
            .await
    }

    /// Exchange the stored refresh token and persist the new pair.
    /// Any failure is logged and reported as `None`.
    async fn refresh_from_vault(&self) -> Option<AuthTokens> {
        let vault = self.session.vault();
        let refresh_token = match vault.refresh_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No refresh token stored");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read refresh token");
                return None;
            }
        };

        let tokens = match self.exchange_refresh_token(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Failed to refresh tokens");
                return None;
            }
        };

        if let Err(e) = vault.store_tokens(&tokens).await {
            warn!(error = %e, "Failed to store refreshed tokens");
            return None;
        }
        debug!("Tokens refreshed");
        Some(tokens)
    }

    /// Make one `POST /auth/refresh` call. Nothing is persisted here.
    pub async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<AuthTokens, ApiError> {
        let url = self.url(REFRESH_PATH)?;
        let body = serde_json::to_vec(&RefreshRequest { refresh_token })
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let response = self
            .send(&Method::POST, &url, &Self::base_headers(), Some(&body))
            .await?;
        let value = Self::read_response(response).await?;
        Self::decode(value, REFRESH_PATH)
    }

    // ===== Typed Helpers =====

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let value = self.request(method, path, options).await?;
        Self::decode(value, path)
    }

    fn with_body<B: Serialize + ?Sized>(
        options: RequestOptions,
        body: &B,
    ) -> Result<RequestOptions, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        Ok(options.body(body))
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.send_json(Method::GET, path, options).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let options = Self::with_body(options, body)?;
        self.send_json(Method::POST, path, options).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let options = Self::with_body(options, body)?;
        self.send_json(Method::PUT, path, options).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let options = Self::with_body(options, body)?;
        self.send_json(Method::PATCH, path, options).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.send_json(Method::DELETE, path, options).await
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::json;

    use super::*;
    use crate::vault::Vault;

    async fn client_for(url: String, tokens: Option<(&str, &str)>) -> ApiClient {
        let vault = Vault::in_memory();
        if let Some((access, refresh)) = tokens {
            vault
                .store_tokens(&AuthTokens::bearer(access, refresh))
                .await
                .unwrap();
        }
        let session = Arc::new(SessionStore::new(vault));
        session.hydrate().await;
        ApiClient::new(Some(url), session).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let session = Arc::new(SessionStore::new(Vault::in_memory()));
        let client = ApiClient::new(Some("https://api.example.edu/v1/".to_string()), session).unwrap();
        assert_eq!(client.url("/auth/login").unwrap(), "https://api.example.edu/v1/auth/login");
        assert_eq!(client.url("courses").unwrap(), "https://api.example.edu/v1/courses");
    }

    #[tokio::test]
    async fn test_missing_base_url_fails_at_request_time() {
        let session = Arc::new(SessionStore::new(Vault::in_memory()));
        let client = ApiClient::new(None, session).unwrap();
        let err = client
            .request(Method::GET, "/courses", RequestOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingBaseUrl));
    }

    #[tokio::test]
    async fn test_attaches_bearer_and_json_body() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/courses")
            .match_header("authorization", "Bearer AT1")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({"name": "Compilers"})))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": 7, "name": "Compilers"}"#)
            .create_async()
            .await;

        let client = client_for(server.url(), Some(("AT1", "RT1"))).await;
        let value = client
            .request(
                Method::POST,
                "/courses",
                RequestOptions::new().body(json!({"name": "Compilers"})),
            )
            .await
            .unwrap();

        m.assert_async().await;
        assert_eq!(value, Some(json!({"id": 7, "name": "Compilers"})));
    }

    #[tokio::test]
    async fn test_missing_token_sends_unauthenticated() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/public/terms")
            .match_header("authorization", Matcher::Missing)
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body(r#"["fall","spring"]"#)
            .create_async()
            .await;

        let client = client_for(server.url(), None).await;
        let terms: Vec<String> = client.get("/public/terms", RequestOptions::new()).await.unwrap();

        m.assert_async().await;
        assert_eq!(terms, vec!["fall", "spring"]);
    }

    #[tokio::test]
    async fn test_skip_auth_omits_token() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/health")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let client = client_for(server.url(), Some(("AT1", "RT1"))).await;
        client
            .request(Method::GET, "/health", RequestOptions::unauthenticated())
            .await
            .unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_caller_headers_override_content_type() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("GET", "/export")
            .match_header("content-type", "text/csv")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = client_for(server.url(), None).await;
        client
            .request(
                Method::GET,
                "/export",
                RequestOptions::new().header(header::CONTENT_TYPE, HeaderValue::from_static("text/csv")),
            )
            .await
            .unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_content_yields_none() {
        let mut server = Server::new_async().await;
        server
            .mock("DELETE", "/courses/7")
            .with_status(204)
            .create_async()
            .await;

        let client = client_for(server.url(), Some(("AT1", "RT1"))).await;
        let value = client
            .request(Method::DELETE, "/courses/7", RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(value, None);

        client
            .delete::<()>("/courses/7", RequestOptions::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_http_error_carries_status_and_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/courses/99")
            .with_status(404)
            .with_body(r#"{"detail":"Course not found"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/broken")
            .with_status(500)
            .with_body("Internal Server Error")
            .create_async()
            .await;

        let client = client_for(server.url(), Some(("AT1", "RT1"))).await;

        match client.request(Method::GET, "/courses/99", RequestOptions::new()).await {
            Err(ApiError::Http { status, data }) => {
                assert_eq!(status, 404);
                assert_eq!(data, json!({"detail": "Course not found"}));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        match client.request(Method::GET, "/broken", RequestOptions::new()).await {
            Err(ApiError::Http { status, data }) => {
                assert_eq!(status, 500);
                assert_eq!(data, json!("Internal Server Error"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_reported() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/courses")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let client = client_for(server.url(), Some(("AT1", "RT1"))).await;
        let err = client
            .request(Method::GET, "/courses", RequestOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let client = client_for(format!("http://{}", addr), Some(("AT1", "RT1"))).await;
        let err = client
            .request(Method::GET, "/courses", RequestOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_refresh_then_single_retry() {
        let mut server = Server::new_async().await;
        let stale = server
            .mock("GET", "/courses")
            .match_header("authorization", "Bearer AT1")
            .with_status(401)
            .with_body(r#"{"detail":"Token expired"}"#)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", REFRESH_PATH)
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::Json(json!({"refresh_token": "RT1"})))
            .with_status(200)
            .with_body(r#"{"access_token":"AT2","refresh_token":"RT2","token_type":"bearer"}"#)
            .expect(1)
            .create_async()
            .await;
        let retried = server
            .mock("GET", "/courses")
            .match_header("authorization", "Bearer AT2")
            .with_status(200)
            .with_body(r#"[{"id":1}]"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(server.url(), Some(("AT1", "RT1"))).await;
        let value = client
            .request(Method::GET, "/courses", RequestOptions::new())
            .await
            .unwrap();

        stale.assert_async().await;
        refresh.assert_async().await;
        retried.assert_async().await;
        assert_eq!(value, Some(json!([{"id": 1}])));
        assert_eq!(
            client.session().vault().tokens().await.unwrap(),
            Some(("AT2".to_string(), "RT2".to_string()))
        );
        assert!(client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_retry_outcome_is_final() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/courses")
            .with_status(401)
            .expect(2)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", REFRESH_PATH)
            .with_status(200)
            .with_body(r#"{"access_token":"AT2","refresh_token":"RT2","token_type":"bearer"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(server.url(), Some(("AT1", "RT1"))).await;
        let err = client
            .request(Method::GET, "/courses", RequestOptions::new())
            .await
            .unwrap_err();

        refresh.assert_async().await;
        assert_eq!(err.status(), Some(401));
        // A rejected retry is an ordinary failure, not an expired session
        assert!(client.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_rejected_refresh_expires_session() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/courses")
            .match_header("authorization", "Bearer AT1")
            .with_status(401)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", REFRESH_PATH)
            .with_status(401)
            .with_body(r#"{"detail":"Invalid refresh token"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(server.url(), Some(("AT1", "RT1"))).await;
        let mut rx = client.session().subscribe();
        let err = client
            .request(Method::GET, "/courses", RequestOptions::new())
            .await
            .unwrap_err();

        refresh.assert_async().await;
        assert!(matches!(err, ApiError::SessionExpired));
        let session = rx.borrow_and_update().clone();
        assert!(!session.authenticated);
        assert_eq!(session.user, None);
        assert_eq!(client.session().vault().tokens().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_expires_without_refresh_call() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/courses")
            .with_status(401)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", REFRESH_PATH)
            .expect(0)
            .create_async()
            .await;

        let client = client_for(server.url(), None).await;
        client
            .session()
            .vault()
            .set(crate::vault::TokenKey::Access, "AT1")
            .await
            .unwrap();

        let err = client
            .request(Method::GET, "/courses", RequestOptions::new())
            .await
            .unwrap_err();
        refresh.assert_async().await;
        assert!(matches!(err, ApiError::SessionExpired));
        assert_eq!(client.session().vault().access_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_skip_auth_401_is_not_refreshed() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body(r#"{"detail":"Invalid email or password"}"#)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", REFRESH_PATH)
            .expect(0)
            .create_async()
            .await;

        let client = client_for(server.url(), Some(("AT1", "RT1"))).await;
        let err = client
            .request(Method::POST, "/auth/login", RequestOptions::unauthenticated())
            .await
            .unwrap_err();

        refresh.assert_async().await;
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.detail().as_deref(), Some("Invalid email or password"));
        assert!(client.session().is_authenticated());
    }
}
