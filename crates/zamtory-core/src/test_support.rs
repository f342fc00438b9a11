//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use crate::api::{ApiError, AuthApi};
use crate::models::{AuthGrant, RefreshedToken, UserRecord};

pub(crate) fn sample_user(id: &str) -> UserRecord {
    let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    UserRecord {
        id: id.to_string(),
        email: "a@b.com".to_string(),
        username: "writer".to_string(),
        display_name: Some("Writer".to_string()),
        avatar: None,
        created_at: at,
        updated_at: at,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Authenticate(String),
    Refresh(String),
    FetchCurrentUser,
    Logout,
}

type Failure = Box<dyn Fn() -> ApiError + Send + Sync>;

/// Auth client double that records every call.
pub(crate) struct RecordingAuthClient {
    calls: Mutex<Vec<Call>>,
    token: Mutex<Option<String>>,
    user: UserRecord,
    login_failure: Option<Failure>,
    refresh_failure: Option<Failure>,
    logout_fails: bool,
    refresh_gate: Option<Arc<Notify>>,
    refreshes: Mutex<u32>,
}

impl RecordingAuthClient {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            token: Mutex::new(None),
            user: sample_user("u1"),
            login_failure: None,
            refresh_failure: None,
            logout_fails: false,
            refresh_gate: None,
            refreshes: Mutex::new(0),
        }
    }

    pub(crate) fn failing_login(mut self, failure: impl Fn() -> ApiError + Send + Sync + 'static) -> Self {
        self.login_failure = Some(Box::new(failure));
        self
    }

    pub(crate) fn failing_refresh(mut self, failure: impl Fn() -> ApiError + Send + Sync + 'static) -> Self {
        self.refresh_failure = Some(Box::new(failure));
        self
    }

    pub(crate) fn failing_logout(mut self) -> Self {
        self.logout_fails = true;
        self
    }

    /// Hold every refresh until the gate is notified.
    pub(crate) fn gated_refresh(mut self, gate: Arc<Notify>) -> Self {
        self.refresh_gate = Some(gate);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn refresh_tokens_sent(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Refresh(token) => Some(token),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AuthApi for RecordingAuthClient {
    async fn authenticate(&self, email: &str, _password: &str) -> Result<AuthGrant, ApiError> {
        self.record(Call::Authenticate(email.to_string()));
        if let Some(failure) = &self.login_failure {
            return Err(failure());
        }
        Ok(AuthGrant {
            user: self.user.clone(),
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            expires_in: 900,
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError> {
        self.record(Call::Refresh(refresh_token.to_string()));
        if let Some(gate) = self.refresh_gate.clone() {
            gate.notified().await;
        }
        if let Some(failure) = &self.refresh_failure {
            return Err(failure());
        }
        let n = {
            let mut refreshes = self.refreshes.lock().unwrap();
            *refreshes += 1;
            *refreshes
        };
        Ok(RefreshedToken {
            access_token: format!("access-refreshed-{}", n),
            expires_in: 900,
        })
    }

    async fn fetch_current_user(&self) -> Result<UserRecord, ApiError> {
        self.record(Call::FetchCurrentUser);
        if self.access_token().is_none() {
            return Err(ApiError::Unauthorized);
        }
        Ok(self.user.clone())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.record(Call::Logout);
        if self.logout_fails {
            return Err(ApiError::Network("connection reset".to_string()));
        }
        Ok(())
    }

    fn set_access_token(&self, token: Option<String>) {
        *self.token.lock().unwrap() = token;
    }

    fn access_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }
}
