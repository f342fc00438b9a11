use thiserror::Error;

use crate::api::ApiError;
use crate::store::StoreError;

/// Credential problems caught before any request is sent.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// Names the missing field
    #[error("{0} is required")]
    RequiredField(&'static str),

    #[error("Email address is not valid")]
    InvalidEmail,

    #[error("Password must be at least {0} characters")]
    PasswordTooShort(usize),
}

/// Failures surfaced by the session manager.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid credentials: {0}")]
    Validation(#[from] ValidationError),

    #[error("No refresh token stored")]
    MissingRefreshToken,

    #[error("Authentication rejected: {0}")]
    AuthenticationRejected(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Stored session data is corrupt: {0}")]
    StorageCorrupt(String),

    #[error("Token storage failed: {0}")]
    Storage(#[from] StoreError),

    #[error("Unexpected auth endpoint response: {0}")]
    Api(ApiError),

    #[error("Superseded by a newer session change")]
    Superseded,
}

impl SessionError {
    /// Classify an endpoint failure raised while logging in.
    pub fn from_login(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized | ApiError::AccessDenied(_) => {
                SessionError::AuthenticationRejected(err.to_string())
            }
            ApiError::Network(_) | ApiError::Timeout => SessionError::NetworkError(err.to_string()),
            other => SessionError::Api(other),
        }
    }

    /// Classify an endpoint failure raised while refreshing.
    pub fn from_refresh(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized | ApiError::AccessDenied(_) => {
                SessionError::SessionExpired(err.to_string())
            }
            ApiError::Network(_) | ApiError::Timeout => SessionError::NetworkError(err.to_string()),
            other => SessionError::Api(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_classification() {
        assert!(matches!(
            SessionError::from_login(ApiError::Unauthorized),
            SessionError::AuthenticationRejected(_)
        ));
        assert!(matches!(
            SessionError::from_login(ApiError::Timeout),
            SessionError::NetworkError(_)
        ));
        assert!(matches!(
            SessionError::from_login(ApiError::ServerError("boom".to_string())),
            SessionError::Api(ApiError::ServerError(_))
        ));
    }

    #[test]
    fn test_refresh_classification() {
        assert!(matches!(
            SessionError::from_refresh(ApiError::Unauthorized),
            SessionError::SessionExpired(_)
        ));
        assert!(matches!(
            SessionError::from_refresh(ApiError::AccessDenied("revoked".to_string())),
            SessionError::SessionExpired(_)
        ));
        assert!(matches!(
            SessionError::from_refresh(ApiError::Network("connection reset".to_string())),
            SessionError::NetworkError(_)
        ));
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::PasswordTooShort(8).to_string(),
            "Password must be at least 8 characters"
        );
        let err: SessionError = ValidationError::RequiredField("Email").into();
        assert_eq!(err.to_string(), "Invalid credentials: Email is required");
    }
}
