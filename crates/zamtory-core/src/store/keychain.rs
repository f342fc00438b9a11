use keyring::Entry;
use tracing::debug;

use super::{KeyValueStore, StoreError};

/// Default keychain service name
pub const SERVICE_NAME: &str = "zamtory";

/// Durable store backed by the OS keychain. Each key is a separate
/// keychain entry under one service name.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl KeyValueStore for KeyringStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => {
                debug!(key = key, "Keychain entry already absent");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The mock backend keeps each entry separate, so a value written through
    // one call is not visible to the next. Only single-call paths are covered.
    fn mock_store() -> KeyringStore {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        KeyringStore::new("zamtory-test")
    }

    #[test]
    fn test_missing_entry_reads_as_absent() {
        let store = mock_store();
        assert_eq!(store.get_item("zamtory_refresh_token").expect("get"), None);
    }

    #[test]
    fn test_removing_missing_entry_is_harmless() {
        let store = mock_store();
        store.remove_item("zamtory_refresh_token").expect("remove");
    }

    #[test]
    fn test_set_item_succeeds() {
        let store = mock_store();
        store.set_item("zamtory_user", "{}").expect("set");
    }

    #[test]
    fn test_default_service_name() {
        assert_eq!(KeyringStore::default().service, SERVICE_NAME);
    }
}
