//! HTTP implementation of the auth endpoint client.
//!
//! A thin JSON wrapper around `reqwest` that attaches the bearer token set
//! by the session manager and maps non-success statuses to `ApiError`.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ApiError, AuthApi};
use crate::models::{AuthGrant, RefreshedToken, UserRecord};

// ============================================================================
// Constants
// ============================================================================

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

/// HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct CurrentUserResponse {
    user: UserRecord,
}

/// Auth endpoint client speaking JSON over HTTP.
pub struct HttpAuthClient {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpAuthClient {
    /// Create a client for `base_url` with the given request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    /// Create a client against the default base URL and timeout.
    pub fn with_defaults() -> Result<Self, ApiError> {
        Self::new(DEFAULT_BASE_URL, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = self.access_token() {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::InvalidRequest(format!("Invalid access token: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, retrying rate-limited responses with exponential backoff.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header(header::ACCEPT, "application/json")
                .headers(self.auth_headers()?);
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(method = %method, url = %url, "Sending auth request");
            let response = request.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let response = self.send(method, path, body).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, e))
        })
    }
}

#[async_trait]
impl AuthApi for HttpAuthClient {
    async fn authenticate(&self, email: &str, password: &str) -> Result<AuthGrant, ApiError> {
        let body = LoginRequest { email, password };
        self.send_json(Method::POST, "/auth/login", Some(&body)).await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError> {
        let body = RefreshRequest { refresh_token };
        self.send_json(Method::POST, "/auth/refresh", Some(&body)).await
    }

    async fn fetch_current_user(&self) -> Result<UserRecord, ApiError> {
        if self.access_token().is_none() {
            return Err(ApiError::Unauthorized);
        }
        let response: CurrentUserResponse =
            self.send_json(Method::GET, "/auth/me", None::<&()>).await?;
        Ok(response.user)
    }

    async fn logout(&self) -> Result<(), ApiError> {
        // Response body is irrelevant; only the status matters
        self.send(Method::POST, "/auth/logout", None::<&()>).await?;
        Ok(())
    }

    fn set_access_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn access_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HttpAuthClient::new("https://api.example.com/api/", Duration::from_secs(5))
            .expect("Failed to build client");
        assert_eq!(client.base_url(), "https://api.example.com/api");
        assert_eq!(client.url("/auth/me"), "https://api.example.com/api/auth/me");
    }

    #[test]
    fn test_auth_header_follows_token() {
        let client = HttpAuthClient::with_defaults().expect("Failed to build client");
        assert!(client.auth_headers().expect("headers").is_empty());

        client.set_access_token(Some("tok1".to_string()));
        let headers = client.auth_headers().expect("headers");
        assert_eq!(
            headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer tok1")
        );

        client.set_access_token(None);
        assert!(client.auth_headers().expect("headers").is_empty());
    }

    #[test]
    fn test_auth_header_rejects_control_characters() {
        let client = HttpAuthClient::with_defaults().expect("Failed to build client");
        client.set_access_token(Some("bad\ntoken".to_string()));
        assert!(matches!(client.auth_headers(), Err(ApiError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_fetch_current_user_requires_token() {
        let client = HttpAuthClient::with_defaults().expect("Failed to build client");
        let result = client.fetch_current_user().await;
        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[test]
    fn test_request_bodies_use_wire_names() {
        let login = serde_json::to_value(LoginRequest { email: "a@b.com", password: "longenough1" })
            .expect("serialize");
        assert_eq!(login["email"], "a@b.com");

        let refresh = serde_json::to_value(RefreshRequest { refresh_token: "rt" }).expect("serialize");
        assert_eq!(refresh["refreshToken"], "rt");
    }
}
