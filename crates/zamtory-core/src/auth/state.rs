use serde::Serialize;

use crate::models::UserRecord;

/// In-memory session state observed by UI layers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<UserRecord>,
    pub is_loading: bool,
}

impl SessionState {
    /// Derived from `user`, never stored.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user: self.user.clone(),
            is_authenticated: self.is_authenticated(),
            is_loading: self.is_loading,
        }
    }
}

/// Starts empty and loading until the stored session has been checked.
impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            is_loading: true,
        }
    }
}

/// Serializable view of `SessionState` for UI bindings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub user: Option<UserRecord>,
    pub is_authenticated: bool,
    pub is_loading: bool,
}

/// Discrete session transitions broadcast to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(UserRecord),
    Refreshed(UserRecord),
    SignedOut,
    /// Refresh failed and the session was dropped
    Expired,
    /// Route the UI should move to
    Navigate(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_user;

    #[test]
    fn test_initial_state_is_loading_and_signed_out() {
        let state = SessionState::default();
        assert!(state.is_loading);
        assert!(!state.is_authenticated());
    }

    #[test]
    fn test_snapshot_derives_authentication() {
        let state = SessionState {
            user: Some(sample_user("u1")),
            is_loading: false,
        };
        let snapshot = state.snapshot();
        assert!(snapshot.is_authenticated);

        let json = serde_json::to_value(&snapshot).expect("serialize");
        assert_eq!(json["isAuthenticated"], true);
        assert_eq!(json["isLoading"], false);
        assert_eq!(json["user"]["id"], "u1");
    }
}
