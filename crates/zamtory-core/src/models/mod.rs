//! Data models for the authentication session.
//!
//! - `UserRecord`: the signed-in user, cached in the token store
//! - `TokenPair`: access/refresh tokens plus the persistence tier flag
//! - `AuthGrant`, `RefreshedToken`: auth endpoint payloads

pub mod token;
pub mod user;

pub use token::{AuthGrant, RefreshedToken, TokenPair};
pub use user::UserRecord;
