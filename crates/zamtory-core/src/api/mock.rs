//! Development auth client that never touches the network.
//!
//! Any credentials are accepted. The user record is fabricated from the
//! email address and the tokens are fixed mock values, so the rest of the
//! session lifecycle (storage tiers, refresh timer, logout) can be exercised
//! without a backend.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use tracing::debug;

use super::{ApiError, AuthApi};
use crate::models::{AuthGrant, RefreshedToken, UserRecord};

pub const MOCK_USER_ID: &str = "mock-user-1";
pub const MOCK_ACCESS_TOKEN: &str = "mock-access-token";
pub const MOCK_REFRESH_TOKEN: &str = "mock-refresh-token";

/// Separates the fixed refresh token prefix from the signed-in email
const REFRESH_EMAIL_SEPARATOR: char = ':';

/// Email used when a user has to be fabricated without a login
const FALLBACK_EMAIL: &str = "mock@zamtory.dev";

/// Simulated round trip so the UI loading state is visible
pub const DEFAULT_MOCK_LATENCY: Duration = Duration::from_millis(500);

/// Mock access tokens expire after 15 minutes
const MOCK_EXPIRES_IN_SECS: u64 = 900;

pub struct MockAuthClient {
    latency: Duration,
    user: Mutex<Option<UserRecord>>,
    token: Mutex<Option<String>>,
}

impl MockAuthClient {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            user: Mutex::new(None),
            token: Mutex::new(None),
        }
    }

    /// Build the fabricated user for an email address.
    pub fn mock_user(email: &str) -> UserRecord {
        let local = email.split('@').next().unwrap_or(email).to_string();
        let now = Utc::now();
        UserRecord {
            id: MOCK_USER_ID.to_string(),
            email: email.to_string(),
            username: local.clone(),
            display_name: Some(local),
            avatar: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh token handed out at login. Carries the email so a later
    /// process can rebuild the same user from the stored token alone.
    pub fn refresh_token_for(email: &str) -> String {
        format!("{}{}{}", MOCK_REFRESH_TOKEN, REFRESH_EMAIL_SEPARATOR, email)
    }

    /// Email embedded in a mock refresh token, if any.
    fn email_from_refresh_token(refresh_token: &str) -> Option<&str> {
        refresh_token
            .strip_prefix(MOCK_REFRESH_TOKEN)?
            .strip_prefix(REFRESH_EMAIL_SEPARATOR)
            .filter(|email| !email.is_empty())
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl Default for MockAuthClient {
    fn default() -> Self {
        Self::new(DEFAULT_MOCK_LATENCY)
    }
}

#[async_trait]
impl AuthApi for MockAuthClient {
    async fn authenticate(&self, email: &str, _password: &str) -> Result<AuthGrant, ApiError> {
        self.simulate_latency().await;
        let user = Self::mock_user(email);
        *self.user.lock().unwrap_or_else(PoisonError::into_inner) = Some(user.clone());
        debug!(user_id = %user.id, "Mock authentication succeeded");

        Ok(AuthGrant {
            user,
            access_token: MOCK_ACCESS_TOKEN.to_string(),
            refresh_token: Self::refresh_token_for(email),
            expires_in: MOCK_EXPIRES_IN_SECS,
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError> {
        self.simulate_latency().await;
        if !refresh_token.starts_with(MOCK_REFRESH_TOKEN) {
            return Err(ApiError::Unauthorized);
        }
        if let Some(email) = Self::email_from_refresh_token(refresh_token) {
            let mut user = self.user.lock().unwrap_or_else(PoisonError::into_inner);
            if user.as_ref().map(|u| u.email.as_str()) != Some(email) {
                debug!("Rebuilding mock user from refresh token");
                *user = Some(Self::mock_user(email));
            }
        }
        let suffix: u32 = rand::thread_rng().gen();
        Ok(RefreshedToken {
            access_token: format!("{}-{:08x}", MOCK_ACCESS_TOKEN, suffix),
            expires_in: MOCK_EXPIRES_IN_SECS,
        })
    }

    async fn fetch_current_user(&self) -> Result<UserRecord, ApiError> {
        self.simulate_latency().await;
        if self.access_token().is_none() {
            return Err(ApiError::Unauthorized);
        }
        let mut user = self.user.lock().unwrap_or_else(PoisonError::into_inner);
        let record = user.get_or_insert_with(|| Self::mock_user(FALLBACK_EMAIL));
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        *self.user.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn set_access_token(&self, token: Option<String>) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn access_token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
