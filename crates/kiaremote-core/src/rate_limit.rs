//! Per-identity command rate limiting.
//!
//! The window is a sliding checkpoint, not a true sliding or fixed window:
//! a command is allowed if the identity has no record, or no command has
//! been recorded yet, or at least one window has elapsed since the last
//! recorded command, or fewer than `max_commands` are counted. The counter
//! is never reset when the window elapses; it keeps growing from its old
//! value on the next recorded command.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::auth::UserIdentity;
use crate::config::RateLimitConfig;
use crate::error::Result;
use crate::store::{CredentialStore, SessionRecord};

pub struct RateLimiter {
    store: Arc<CredentialStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<CredentialStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// May `identity` issue another command now?
    pub fn check_rate_limit(&self, identity: &UserIdentity) -> Result<bool> {
        let record = self.store.record(identity)?;
        let allowed = self.is_allowed(record.as_ref(), Utc::now());
        debug!(identity = identity.short(), allowed, "Rate limit checked");
        Ok(allowed)
    }

    /// Record one counted command for `identity`
    pub fn update_rate_limit(&self, identity: &UserIdentity) -> Result<u32> {
        let now = Utc::now();
        let count = self.store.update(|map| {
            let record = map.entry(identity.clone()).or_default();
            record.last_command_at = Some(now);
            record.command_count = record.command_count.saturating_add(1);
            record.command_count
        })?;
        debug!(identity = identity.short(), count, "Rate limit usage recorded");
        Ok(count)
    }

    /// The policy itself, evaluated against `now`
    pub fn is_allowed(&self, record: Option<&SessionRecord>, now: DateTime<Utc>) -> bool {
        let Some(record) = record else {
            return true;
        };
        let Some(last) = record.last_command_at else {
            return true;
        };
        if now - last >= self.config.window() {
            return true;
        }
        record.command_count < self.config.max_commands
    }
}
