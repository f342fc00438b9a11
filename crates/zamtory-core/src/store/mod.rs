//! Token storage tiers.
//!
//! Session data lives in two tiers of a simple key-value store:
//! - durable: survives restarts (`FileStore` or `KeyringStore`)
//! - ephemeral: scoped to the running process (`MemoryStore`)
//!
//! `TokenVault` owns the keys and decides which tier each value goes to.

pub mod file;
pub mod keychain;
pub mod memory;
pub mod vault;

use thiserror::Error;

pub use file::FileStore;
pub use keychain::KeyringStore;
pub use memory::MemoryStore;
pub use vault::TokenVault;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed store file {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// A string key-value store, the shape of browser `localStorage`.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), StoreError>;
}
