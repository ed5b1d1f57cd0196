//! Session cache, rate limiter and command dispatch for the Kia owners
//! portal.
//!
//! A `CommandDispatcher` authenticates against the portal (reusing cached
//! vehicle keys and cookies from the encrypted `CredentialStore`), enforces a
//! per-identity command quota, and retries a failed command once after a
//! forced re-login.

pub mod api;
pub mod auth;
pub mod cipher;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod rate_limit;
pub mod store;

#[cfg(test)]
mod testing;

pub use api::{Endpoints, HttpTransport, Transport};
pub use auth::{Credentials, Keychain, SessionManager, UserIdentity};
pub use cipher::Cipher;
pub use commands::{Command, CommandParams, Location};
pub use config::Config;
pub use dispatch::{CommandDispatcher, Outcome};
pub use error::{Error, Result};
pub use rate_limit::RateLimiter;
pub use store::{CredentialStore, FileBackend};
