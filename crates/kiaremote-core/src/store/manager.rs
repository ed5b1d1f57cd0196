use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use super::backend::StoreBackend;
use super::record::SessionRecord;
use crate::auth::UserIdentity;
use crate::cipher::Cipher;
use crate::error::Result;

pub type SessionMap = HashMap<UserIdentity, SessionRecord>;

/// Encrypted, persistent map from user identity to cached session state.
///
/// Nothing is cached in memory between calls: every read goes to the
/// backend so callers always see the latest persisted state. Every
/// load-modify-save cycle runs under one mutex, so concurrent updates for
/// different identities cannot overwrite each other.
pub struct CredentialStore {
    backend: Box<dyn StoreBackend>,
    cipher: Cipher,
    write_lock: Mutex<()>,
}

impl CredentialStore {
    pub fn new(backend: Box<dyn StoreBackend>, cipher: Cipher) -> Self {
        Self {
            backend,
            cipher,
            write_lock: Mutex::new(()),
        }
    }

    /// Read and decrypt the whole map. An empty backend yields an empty map;
    /// a blob that fails to decrypt or parse is an error, never a reset.
    pub fn load(&self) -> Result<SessionMap> {
        let Some(blob) = self.backend.read()? else {
            return Ok(SessionMap::new());
        };
        if blob.trim().is_empty() {
            return Ok(SessionMap::new());
        }

        let plaintext = self.cipher.decrypt(&blob)?;
        let map: SessionMap = serde_json::from_slice(&plaintext)?;
        debug!(records = map.len(), "Session store loaded");
        Ok(map)
    }

    /// Encrypt and write the whole map, replacing prior contents
    pub fn save(&self, map: &SessionMap) -> Result<()> {
        let _guard = self.lock();
        self.save_unlocked(map)
    }

    fn save_unlocked(&self, map: &SessionMap) -> Result<()> {
        let plaintext = serde_json::to_vec(map)?;
        let blob = self.cipher.encrypt(&plaintext)?;
        self.backend.write(&blob)?;
        debug!(records = map.len(), "Session store saved");
        Ok(())
    }

    /// Load, apply `f`, save; atomically with respect to other store calls.
    pub fn update<T>(&self, f: impl FnOnce(&mut SessionMap) -> T) -> Result<T> {
        let _guard = self.lock();
        let mut map = self.load()?;
        let out = f(&mut map);
        self.save_unlocked(&map)?;
        Ok(out)
    }

    /// The record for one identity, if any
    pub fn record(&self, identity: &UserIdentity) -> Result<Option<SessionRecord>> {
        Ok(self.load()?.remove(identity))
    }

    /// Drop records with no activity for longer than `max_idle`.
    /// Returns the number removed.
    pub fn prune_idle(&self, max_idle: Duration, now: DateTime<Utc>) -> Result<usize> {
        let removed = self.update(|map| {
            let before = map.len();
            map.retain(|_, record| !record.is_idle(max_idle, now));
            before - map.len()
        })?;
        info!(removed, "Pruned idle sessions");
        Ok(removed)
    }

    /// Non-secret overview of every cached record, sorted by identity
    pub fn summaries(&self) -> Result<Vec<RecordSummary>> {
        let mut summaries: Vec<RecordSummary> = self
            .load()?
            .into_iter()
            .map(|(identity, record)| RecordSummary {
                identity: identity.short().to_string(),
                has_session: record.has_session(),
                cookie_count: record.cookies.len(),
                authenticated_at: record.authenticated_at,
                last_command_at: record.last_command_at,
                command_count: record.command_count,
            })
            .collect();
        summaries.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(summaries)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSummary {
    pub identity: String,
    pub has_session: bool,
    pub cookie_count: usize,
    pub authenticated_at: Option<DateTime<Utc>>,
    pub last_command_at: Option<DateTime<Utc>>,
    pub command_count: u32,
}
