use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use crate::api::{merge_cookies, Endpoints, Request, Transport};
use crate::commands::parse_vehicle_key;
use crate::error::Result;
use crate::store::CredentialStore;

use super::{Credentials, UserIdentity};

/// A live session for one request: the vehicle key plus the cookies that
/// go with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub vehicle_key: String,
    pub cookies: Vec<String>,
}

/// Logs users in and reuses cached sessions.
///
/// Sessions never expire on their own; the caller forces a re-login when a
/// command fails.
pub struct SessionManager<T: Transport> {
    transport: Arc<T>,
    store: Arc<CredentialStore>,
    endpoints: Endpoints,
}

impl<T: Transport> SessionManager<T> {
    pub fn new(transport: Arc<T>, store: Arc<CredentialStore>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            store,
            endpoints,
        }
    }

    /// Return a session for `credentials`.
    ///
    /// With `force = false` a cached session is returned without touching the
    /// network. Otherwise (or when nothing is cached) the full authentication
    /// exchange runs and its vehicle key and cookies replace the cached ones.
    pub async fn login(&self, credentials: &Credentials, force: bool) -> Result<Session> {
        let identity = credentials.identity();

        if !force {
            if let Some(record) = self.store.record(&identity)? {
                if let Some(vehicle_key) = record.vehicle_key.filter(|k| !k.is_empty()) {
                    debug!(identity = identity.short(), "Reusing cached session");
                    return Ok(Session {
                        vehicle_key,
                        cookies: record.cookies,
                    });
                }
            }
        }

        info!(username = %credentials.username, force, "Logging in");
        let session = self.authenticate(credentials).await?;

        let now = Utc::now();
        self.store.update(|map| {
            let record = map.entry(identity.clone()).or_default();
            record.vehicle_key = Some(session.vehicle_key.clone());
            record.cookies = session.cookies.clone();
            record.authenticated_at = Some(now);
        })?;

        info!(identity = identity.short(), cookies = session.cookies.len(), "Obtained vehicle key");
        Ok(session)
    }

    /// Fold cookies set by a later response into the cached session so the
    /// next request replays them.
    pub fn refresh_cookies(&self, identity: &UserIdentity, observed: &[String]) -> Result<()> {
        if observed.is_empty() {
            return Ok(());
        }
        self.store.update(|map| {
            if let Some(record) = map.get_mut(identity) {
                merge_cookies(&mut record.cookies, observed);
            }
        })
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        let body = json!({
            "userId": credentials.username,
            "password": credentials.password,
            "userType": "1",
            "vin": "",
            "action": "authenticateUser"
        });

        let response = self
            .transport
            .send(Request::post(self.endpoints.authenticate(), body.to_string()))
            .await?;

        let vehicle_key = parse_vehicle_key(&response.body)?;
        Ok(Session {
            vehicle_key,
            cookies: response.cookies,
        })
    }
}
