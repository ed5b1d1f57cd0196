//! Encrypted session store.
//!
//! This module provides the `CredentialStore`, the single owner of all
//! durable state: per-identity vehicle keys, session cookies and rate-limit
//! counters. The whole map is serialized as JSON, encrypted and written to
//! one backing location (a file by default).

pub mod backend;
pub mod manager;
pub mod record;

pub use backend::{FileBackend, MemoryBackend, StoreBackend};
pub use manager::{CredentialStore, RecordSummary, SessionMap};
pub use record::SessionRecord;
