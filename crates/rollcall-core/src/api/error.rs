use serde_json::Value;
use thiserror::Error;

use crate::vault::VaultError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API base URL is not configured")]
    MissingBaseUrl,

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request failed with status {status}")]
    Http { status: u16, data: Value },

    #[error("Session expired. Please log in again.")]
    SessionExpired,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Credential storage error: {0}")]
    Vault(#[from] VaultError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for response bodies in log output
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Build an `Http` error from a status and raw body.
    /// The body is kept as JSON when it parses, otherwise as a string.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let data = serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()));
        ApiError::Http {
            status: status.as_u16(),
            data,
        }
    }

    /// HTTP status for `Http` errors
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-supplied `detail` text, if the error body carries one.
    ///
    /// Handles both a plain `{"detail": "..."}` and a validation-style
    /// `{"detail": [{"msg": "..."}, ...]}` body.
    pub fn detail(&self) -> Option<String> {
        let ApiError::Http { data, .. } = self else {
            return None;
        };
        match data.get("detail")? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Array(items) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect();
                if messages.is_empty() {
                    None
                } else {
                    Some(messages.join("; "))
                }
            }
            _ => None,
        }
    }

    /// Message to show a user: server detail first, then a description of
    /// the failure kind, then `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        if let Some(detail) = self.detail() {
            return detail;
        }
        match self {
            ApiError::Transport(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            ApiError::Transport(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            ApiError::SessionExpired | ApiError::MissingBaseUrl => self.to_string(),
            _ => fallback.to_string(),
        }
    }

    /// True when the error means the user has to sign in again
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::SessionExpired | ApiError::RefreshFailed(_))
            || self.status() == Some(401)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use serde_json::json;

    #[test]
    fn test_from_status_keeps_json_body() {
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, r#"{"detail":"Email already registered"}"#);
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.detail().as_deref(), Some("Email already registered"));
        assert_eq!(err.user_message("Registration failed"), "Email already registered");
    }

    #[test]
    fn test_from_status_keeps_text_body() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream down");
        match &err {
            ApiError::Http { status, data } => {
                assert_eq!(*status, 502);
                assert_eq!(data, &json!("upstream down"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.detail(), None);
        assert_eq!(err.user_message("Login failed. Please try again."), "Login failed. Please try again.");
    }

    #[test]
    fn test_validation_detail_list() {
        let err = ApiError::Http {
            status: 422,
            data: json!({"detail": [{"loc": ["body", "email"], "msg": "value is not a valid email address"}, {"msg": "field required"}]}),
        };
        assert_eq!(
            err.detail().as_deref(),
            Some("value is not a valid email address; field required")
        );
    }

    #[test]
    fn test_session_expired_message() {
        let err = ApiError::SessionExpired;
        assert_eq!(err.user_message("fallback"), "Session expired. Please log in again.");
        assert!(err.is_auth_failure());
        assert!(!ApiError::InvalidResponse("x".into()).is_auth_failure());
    }

    #[test]
    fn test_truncate_body() {
        let short = "short body";
        assert_eq!(ApiError::truncate_body(short), short);

        let long = "é".repeat(400);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.contains("truncated, 800 total bytes"));
    }
}
