//! Auth endpoint client module.
//!
//! `AuthApi` is the seam the session manager talks through. Two
//! implementations are provided:
//! - `HttpAuthClient`: JSON over HTTP with bearer token authentication
//! - `MockAuthClient`: fabricated users and tokens for offline development
//!
//! Which one is used is decided by `Config::use_mock_authentication`.

pub mod client;
pub mod error;
pub mod mock;

use async_trait::async_trait;

use crate::models::{AuthGrant, RefreshedToken, UserRecord};

pub use client::HttpAuthClient;
pub use error::ApiError;
pub use mock::MockAuthClient;

/// Network collaborator of the session manager.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange email and password for a token pair and user record.
    async fn authenticate(&self, email: &str, password: &str) -> Result<AuthGrant, ApiError>;

    /// Mint a new access token from a refresh token.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError>;

    /// Fetch the user the attached access token belongs to.
    async fn fetch_current_user(&self) -> Result<UserRecord, ApiError>;

    /// Invalidate the session server side.
    async fn logout(&self) -> Result<(), ApiError>;

    /// Attach or detach the bearer token sent with subsequent requests.
    fn set_access_token(&self, token: Option<String>);

    fn access_token(&self) -> Option<String>;
}
