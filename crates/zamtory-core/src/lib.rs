//! Core library for Zamtory's authentication session.
//!
//! - `auth`: the `SessionManager`, credentials validation, the refresh timer
//! - `api`: the `AuthApi` seam plus HTTP and mock implementations
//! - `store`: durable/ephemeral key-value tiers and the `TokenVault`
//! - `models`: user records and token payloads
//! - `config`: application configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{ApiError, AuthApi, HttpAuthClient, MockAuthClient};
pub use auth::{
    Credentials, SessionEvent, SessionManager, SessionSettings, SessionSnapshot, SessionState,
};
pub use config::{Config, DurableBackend};
pub use error::{SessionError, ValidationError};
pub use models::{AuthGrant, RefreshedToken, TokenPair, UserRecord};
pub use store::{FileStore, KeyValueStore, KeyringStore, MemoryStore, StoreError, TokenVault};
