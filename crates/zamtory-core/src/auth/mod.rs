//! Authentication session module.
//!
//! This module provides:
//! - `SessionManager`: login, logout, session restore and token refresh
//! - `Credentials`: login input and its form-level validation
//! - `SessionState` / `SessionEvent`: what UI layers observe
//!
//! Access tokens are refreshed automatically every 5 minutes while a user
//! is signed in.

pub mod credentials;
pub mod session;
pub mod state;

mod timer;

pub use credentials::{validate_email, validate_password, Credentials, MIN_PASSWORD_LENGTH};
pub use session::{SessionManager, SessionSettings};
pub use state::{SessionEvent, SessionSnapshot, SessionState};
