//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::{Endpoints, Request, Response, Transport};
use crate::cipher::Cipher;
use crate::error::{Error, Result};
use crate::store::{CredentialStore, MemoryBackend};

pub const BASE_URL: &str = "https://portal.test";

/// Replays canned results in order and records every request.
/// Running out of script is a transport error.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<Response>>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<Response>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count_matching(&self, fragment: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .count()
    }

    pub fn auth_calls(&self) -> usize {
        self.count_matching("/apiGateway")
    }

    pub fn command_calls(&self) -> usize {
        self.count_matching("/remotevehicledata")
    }

    pub fn location_calls(&self) -> usize {
        self.count_matching("/location/vehicle.html")
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Transport("script exhausted".into())))
    }
}

pub fn body(body: &str) -> Result<Response> {
    Ok(Response {
        body: body.to_string(),
        cookies: Vec::new(),
    })
}

pub fn auth_ok(vehicle_key: &str, cookie: &str) -> Result<Response> {
    Ok(Response {
        body: format!(
            r#"{{"payload":{{"vehicleSummary":[{{"vehicleKey":"{}"}}]}}}}"#,
            vehicle_key
        ),
        cookies: vec![cookie.to_string()],
    })
}

pub fn command_ok() -> Result<Response> {
    body(r#"{"status":{"statusCode":0,"errorType":0,"errorCode":0,"errorMessage":"Success"}}"#)
}

pub fn command_failed() -> Result<Response> {
    body(r#"{"status":{"statusCode":1,"errorType":1,"errorCode":1003,"errorMessage":"Session expired"}}"#)
}

pub fn daily_limit() -> Result<Response> {
    body(r#"{"status":{"statusCode":1,"errorType":1,"errorCode":1126,"errorMessage":"Limit"}}"#)
}

pub fn location_ok(lat: f64, lon: f64) -> Result<Response> {
    body(&format!(
        r#"{{"payload":{{"gpsDetail":{{"coord":{{"lat":{},"lon":{}}}}}}}}}"#,
        lat, lon
    ))
}

pub fn memory_store() -> Arc<CredentialStore> {
    Arc::new(CredentialStore::new(
        Box::new(MemoryBackend::new()),
        Cipher::new([3u8; 32]),
    ))
}

pub fn endpoints() -> Endpoints {
    Endpoints::new(BASE_URL)
}
