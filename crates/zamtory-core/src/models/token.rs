use serde::{Deserialize, Serialize};

use super::UserRecord;

/// The active credential pair. `remember_me` selects the persistence tier
/// for the refresh token; the access token is always ephemeral.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub remember_me: bool,
}

// Tokens stay out of Debug output so they never reach the logs
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

/// Successful response from the login endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthGrant {
    pub user: UserRecord,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

impl AuthGrant {
    pub fn token_pair(&self, remember_me: bool) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            remember_me,
        }
    }
}

/// Successful response from the refresh endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_in: u64,
}
