//! Command dispatch with a single forced re-login retry.
//!
//! Per call: validate → rate check → authenticate → send → interpret. An
//! unsuccessful or unparsable answer earns exactly one forced re-login and
//! one resend; there is never a third attempt.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::api::{Endpoints, Request, Transport};
use crate::auth::{Credentials, Session, SessionManager, UserIdentity};
use crate::commands::{
    is_success, parse_location, Command, CommandParams, DailyLimitDetector, Location,
    LOCATION_REQUEST_BODY,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::rate_limit::RateLimiter;
use crate::store::CredentialStore;

/// Attempts per dispatch: the first try plus one after a forced re-login
const MAX_ATTEMPTS: usize = 2;

/// What the caller gets back from a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The portal accepted the command
    Successful,
    /// Vehicle location
    Location(Location),
    /// Local quota for this window is used up; nothing was sent
    RateLimited,
    /// The portal refused because the vehicle's daily allowance is used up
    DailyLimitReached,
    /// Both attempts failed
    Failed,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Successful => f.write_str("successful"),
            Outcome::Location(location) => write!(f, "{}", location),
            Outcome::RateLimited => f.write_str("rate_limit"),
            Outcome::DailyLimitReached => f.write_str("daily_limit"),
            Outcome::Failed => f.write_str("failed"),
        }
    }
}

/// Interpretation of one vehicle-command attempt
enum Attempt {
    Success,
    LimitReached,
    Unsuccessful,
}

/// Async mutex per identity, so one identity's check → send → record runs
/// to completion before the next starts. Entries are dropped once no
/// dispatch holds or waits on them.
#[derive(Default)]
struct IdentityLocks {
    locks: Mutex<HashMap<UserIdentity, Arc<tokio::sync::Mutex<()>>>>,
}

impl IdentityLocks {
    fn get(&self, identity: &UserIdentity) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        Arc::clone(locks.entry(identity.clone()).or_default())
    }

    /// Call after dropping the handle returned by `get`
    fn release(&self, identity: &UserIdentity) {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        if locks.get(identity).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(identity);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

pub struct CommandDispatcher<T: Transport> {
    transport: Arc<T>,
    sessions: SessionManager<T>,
    rate_limiter: RateLimiter,
    daily_limit: DailyLimitDetector,
    endpoints: Endpoints,
    locks: IdentityLocks,
}

impl<T: Transport> CommandDispatcher<T> {
    pub fn new(transport: Arc<T>, store: Arc<CredentialStore>, config: &Config) -> Self {
        let endpoints = Endpoints::new(config.base_url.clone());
        Self {
            sessions: SessionManager::new(
                Arc::clone(&transport),
                Arc::clone(&store),
                endpoints.clone(),
            ),
            rate_limiter: RateLimiter::new(store, config.rate_limit),
            daily_limit: config.daily_limit_detector(),
            transport,
            endpoints,
            locks: IdentityLocks::default(),
        }
    }

    /// Validate a raw command code, then dispatch it.
    /// An invalid code fails before any store or network access.
    pub async fn dispatch_code(
        &self,
        credentials: &Credentials,
        code: &str,
        params: &CommandParams,
    ) -> Result<Outcome> {
        let command = Command::from_code(code, params).map_err(|e| {
            error!(code, error = %e, "Invalid command");
            e
        })?;
        self.dispatch(credentials, &command).await
    }

    pub async fn dispatch(&self, credentials: &Credentials, command: &Command) -> Result<Outcome> {
        let identity = credentials.identity();
        let lock = self.locks.get(&identity);
        let result = {
            let _guard = lock.lock().await;
            self.dispatch_locked(credentials, &identity, command).await
        };
        drop(lock);
        self.locks.release(&identity);
        result
    }

    async fn dispatch_locked(
        &self,
        credentials: &Credentials,
        identity: &UserIdentity,
        command: &Command,
    ) -> Result<Outcome> {
        if !self.rate_limiter.check_rate_limit(identity)? {
            warn!(username = %credentials.username, "Rate limit exceeded");
            return Ok(Outcome::RateLimited);
        }

        let outcome = if command.is_location() {
            self.locate(credentials, identity).await?
        } else {
            self.run_command(credentials, identity, command).await?
        };

        match outcome {
            Outcome::Failed => error!(command = command.display_name(), "Command failed"),
            ref other => {
                info!(command = command.display_name(), outcome = %other, "Command finished")
            }
        }
        Ok(outcome)
    }

    /// Log in for one attempt. An unusable authentication response counts
    /// as a failed attempt (`None`) rather than an error.
    async fn session_for(
        &self,
        credentials: &Credentials,
        attempt: usize,
    ) -> Result<Option<Session>> {
        match self.sessions.login(credentials, attempt > 1).await {
            Ok(session) => Ok(Some(session)),
            Err(e) if e.is_retryable() => {
                warn!(error = %e, attempt, "Login response unusable");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn run_command(
        &self,
        credentials: &Credentials,
        identity: &UserIdentity,
        command: &Command,
    ) -> Result<Outcome> {
        let payload = command
            .action_payload()
            .ok_or_else(|| Error::InvalidCommand(command.display_name().to_string()))?;
        let url = self.endpoints.vehicle_command(&payload.to_string())?;

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                warn!(command = command.display_name(), "Command failed, logging in again");
            }
            let Some(session) = self.session_for(credentials, attempt).await? else {
                continue;
            };

            info!(command = command.display_name(), attempt, "Sending command");
            // The daily limit is only recognized on the first answer; after a
            // forced re-login anything but success is a failure.
            match self.send_command(&url, identity, &session, attempt == 1).await? {
                Attempt::LimitReached => {
                    warn!(username = %credentials.username, "Daily command limit reached");
                    self.rate_limiter.update_rate_limit(identity)?;
                    return Ok(Outcome::DailyLimitReached);
                }
                Attempt::Success => {
                    self.rate_limiter.update_rate_limit(identity)?;
                    return Ok(Outcome::Successful);
                }
                Attempt::Unsuccessful => {}
            }
        }
        Ok(Outcome::Failed)
    }

    async fn send_command(
        &self,
        url: &str,
        identity: &UserIdentity,
        session: &Session,
        check_daily_limit: bool,
    ) -> Result<Attempt> {
        let request = Request::get(url).with_session(&session.vehicle_key, &session.cookies);
        let response = self.transport.send(request).await?;
        self.keep_cookies(identity, &response.cookies);

        if check_daily_limit && self.daily_limit.matches(&response.body) {
            return Ok(Attempt::LimitReached);
        }
        if is_success(&response.body) {
            return Ok(Attempt::Success);
        }
        debug!(body = %Error::truncate_body(&response.body), "Command not acknowledged");
        Ok(Attempt::Unsuccessful)
    }

    /// The portal has already acted on the request, so a store failure here
    /// must not keep the result from being interpreted and counted.
    fn keep_cookies(&self, identity: &UserIdentity, cookies: &[String]) {
        if let Err(e) = self.sessions.refresh_cookies(identity, cookies) {
            warn!(error = %e, "Failed to save response cookies");
        }
    }

    /// Location queries are not counted against the rate limit. A query that
    /// fails in transit counts as a failed attempt, like an unusable answer.
    async fn locate(&self, credentials: &Credentials, identity: &UserIdentity) -> Result<Outcome> {
        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                warn!("Failed to retrieve the location, attempting again with new session");
            }
            let Some(session) = self.session_for(credentials, attempt).await? else {
                continue;
            };

            info!(attempt, "Getting location of vehicle");
            let request = Request::post(self.endpoints.location(), LOCATION_REQUEST_BODY)
                .with_session(&session.vehicle_key, &session.cookies);
            let response = match self.transport.send(request).await {
                Ok(response) => response,
                Err(Error::Transport(e)) => {
                    warn!(error = %e, attempt, "Location query failed");
                    continue;
                }
                Err(e) => return Err(e),
            };
            self.keep_cookies(identity, &response.cookies);

            match parse_location(&response.body) {
                Ok(location) => {
                    info!("Successfully retrieved vehicle location");
                    return Ok(Outcome::Location(location));
                }
                Err(e) if e.is_retryable() => {
                    debug!(error = %e, attempt, "Location unavailable");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(Outcome::Failed)
    }
}
