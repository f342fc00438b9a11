use std::sync::Arc;

use tracing::warn;

use super::{KeyValueStore, MemoryStore, StoreError};
use crate::error::SessionError;
use crate::models::{TokenPair, UserRecord};

pub const ACCESS_TOKEN_KEY: &str = "zamtory_access_token";
pub const REFRESH_TOKEN_KEY: &str = "zamtory_refresh_token";
pub const USER_KEY: &str = "zamtory_user";

const ALL_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

/// Two-tier token storage.
///
/// The access token always goes to the ephemeral tier. The refresh token and
/// the cached user record go to the durable tier when "remember me" was
/// chosen, otherwise to the ephemeral tier. Reads check durable first.
#[derive(Clone)]
pub struct TokenVault {
    durable: Arc<dyn KeyValueStore>,
    ephemeral: Arc<dyn KeyValueStore>,
}

impl TokenVault {
    pub fn new(durable: Arc<dyn KeyValueStore>, ephemeral: Arc<dyn KeyValueStore>) -> Self {
        Self { durable, ephemeral }
    }

    /// Vault with both tiers held in memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    pub fn durable(&self) -> &dyn KeyValueStore {
        self.durable.as_ref()
    }

    pub fn ephemeral(&self) -> &dyn KeyValueStore {
        self.ephemeral.as_ref()
    }

    /// (selected tier, the other tier)
    fn tiers(&self, remember_me: bool) -> (&dyn KeyValueStore, &dyn KeyValueStore) {
        if remember_me {
            (self.durable.as_ref(), self.ephemeral.as_ref())
        } else {
            (self.ephemeral.as_ref(), self.durable.as_ref())
        }
    }

    /// Persist a token pair, replacing whatever pair was stored before.
    pub fn save_tokens(&self, pair: &TokenPair) -> Result<(), StoreError> {
        self.ephemeral.set_item(ACCESS_TOKEN_KEY, &pair.access_token)?;

        let (selected, other) = self.tiers(pair.remember_me);
        selected.set_item(REFRESH_TOKEN_KEY, &pair.refresh_token)?;
        other.remove_item(REFRESH_TOKEN_KEY)
    }

    pub fn access_token(&self) -> Result<Option<String>, StoreError> {
        Ok(non_empty(self.ephemeral.get_item(ACCESS_TOKEN_KEY)?))
    }

    /// Durable tier first: remembered sessions outrank tab-scoped ones.
    pub fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        if let Some(token) = non_empty(self.durable.get_item(REFRESH_TOKEN_KEY)?) {
            return Ok(Some(token));
        }
        Ok(non_empty(self.ephemeral.get_item(REFRESH_TOKEN_KEY)?))
    }

    pub fn save_user(&self, user: &UserRecord, remember_me: bool) -> Result<(), SessionError> {
        let json = serde_json::to_string(user)
            .map_err(|e| SessionError::StorageCorrupt(format!("Failed to encode user: {}", e)))?;

        let (selected, other) = self.tiers(remember_me);
        selected.set_item(USER_KEY, &json)?;
        other.remove_item(USER_KEY)?;
        Ok(())
    }

    /// Load the cached user record, durable tier first.
    pub fn user(&self) -> Result<Option<UserRecord>, SessionError> {
        let raw = match non_empty(self.durable.get_item(USER_KEY)?) {
            Some(raw) => raw,
            None => match non_empty(self.ephemeral.get_item(USER_KEY)?) {
                Some(raw) => raw,
                None => return Ok(None),
            },
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| SessionError::StorageCorrupt(format!("Cached user record: {}", e)))
    }

    /// Remove every session key from both tiers. Keeps going past failures
    /// and reports the first one.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut first_error = None;
        for (tier, store) in [("ephemeral", &self.ephemeral), ("durable", &self.durable)] {
            for key in ALL_KEYS {
                if let Err(e) = store.remove_item(key) {
                    warn!(tier = tier, key = key, error = %e, "Failed to clear stored session key");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// True when neither tier holds any session key.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        for store in [&self.ephemeral, &self.durable] {
            for key in ALL_KEYS {
                if store.get_item(key)?.is_some() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_user;

    fn pair(remember_me: bool) -> TokenPair {
        TokenPair {
            access_token: "at".to_string(),
            refresh_token: "rt".to_string(),
            remember_me,
        }
    }

    #[test]
    fn test_remember_me_splits_tiers() {
        let vault = TokenVault::in_memory();
        vault.save_tokens(&pair(true)).expect("save tokens");
        vault.save_user(&sample_user("u1"), true).expect("save user");

        assert_eq!(vault.durable().get_item(REFRESH_TOKEN_KEY).expect("get").as_deref(), Some("rt"));
        assert!(vault.durable().get_item(USER_KEY).expect("get").is_some());
        assert_eq!(vault.durable().get_item(ACCESS_TOKEN_KEY).expect("get"), None);
        assert_eq!(vault.ephemeral().get_item(ACCESS_TOKEN_KEY).expect("get").as_deref(), Some("at"));
        assert_eq!(vault.ephemeral().get_item(REFRESH_TOKEN_KEY).expect("get"), None);
    }

    #[test]
    fn test_without_remember_me_nothing_is_durable() {
        let vault = TokenVault::in_memory();
        vault.save_tokens(&pair(false)).expect("save tokens");
        vault.save_user(&sample_user("u1"), false).expect("save user");

        assert_eq!(vault.durable().get_item(REFRESH_TOKEN_KEY).expect("get"), None);
        assert_eq!(vault.durable().get_item(USER_KEY).expect("get"), None);
        assert_eq!(vault.refresh_token().expect("get").as_deref(), Some("rt"));
        assert_eq!(vault.user().expect("user").map(|u| u.id).as_deref(), Some("u1"));
    }

    #[test]
    fn test_new_pair_replaces_other_tier() {
        let vault = TokenVault::in_memory();
        vault.save_tokens(&pair(true)).expect("save tokens");
        vault.save_tokens(&pair(false)).expect("save tokens");
        assert_eq!(vault.durable().get_item(REFRESH_TOKEN_KEY).expect("get"), None);
        assert_eq!(vault.ephemeral().get_item(REFRESH_TOKEN_KEY).expect("get").as_deref(), Some("rt"));
    }

    #[test]
    fn test_refresh_token_prefers_durable() {
        let vault = TokenVault::in_memory();
        vault.ephemeral().set_item(REFRESH_TOKEN_KEY, "ephemeral-rt").expect("set");
        assert_eq!(vault.refresh_token().expect("get").as_deref(), Some("ephemeral-rt"));

        vault.durable().set_item(REFRESH_TOKEN_KEY, "durable-rt").expect("set");
        assert_eq!(vault.refresh_token().expect("get").as_deref(), Some("durable-rt"));

        // Empty values count as absent
        vault.durable().set_item(REFRESH_TOKEN_KEY, "").expect("set");
        assert_eq!(vault.refresh_token().expect("get").as_deref(), Some("ephemeral-rt"));
    }

    #[test]
    fn test_corrupt_user_record() {
        let vault = TokenVault::in_memory();
        vault.ephemeral().set_item(USER_KEY, "{\"id\":").expect("set");
        assert!(matches!(vault.user(), Err(SessionError::StorageCorrupt(_))));
    }

    #[test]
    fn test_clear_empties_every_tier() {
        let vault = TokenVault::in_memory();
        vault.save_tokens(&pair(true)).expect("save tokens");
        vault.save_user(&sample_user("u1"), true).expect("save user");
        vault.ephemeral().set_item(USER_KEY, "stale").expect("set");
        assert!(!vault.is_empty().expect("is_empty"));

        vault.clear().expect("clear");
        assert!(vault.is_empty().expect("is_empty"));
        vault.clear().expect("clear twice");
        assert!(vault.is_empty().expect("is_empty"));
    }
}
