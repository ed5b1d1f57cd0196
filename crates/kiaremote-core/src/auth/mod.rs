//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `Credentials` / `UserIdentity`: the credential pair and its hashed cache key
//! - `SessionManager`: login with session reuse and forced re-login
//! - `Keychain`: OS-level storage for the store encryption secret
//!
//! Sessions are cached in the encrypted `CredentialStore` and never expire on
//! their own.

pub mod credentials;
pub mod keychain;
pub mod session;

pub use credentials::{Credentials, UserIdentity};
pub use keychain::Keychain;
pub use session::{Session, SessionManager};
