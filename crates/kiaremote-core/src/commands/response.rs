use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Substring the portal puts in the body of a successful command response
pub const SUCCESS_MARKER: &str = "Success";

/// Does the body report a successful command?
pub fn is_success(body: &str) -> bool {
    body.contains(SUCCESS_MARKER)
}

/// Extract `payload.vehicleSummary[0].vehicleKey` from an authentication response.
///
/// Error messages never quote the body; it is logged at debug level instead.
pub fn parse_vehicle_key(body: &str) -> Result<String> {
    let json: Value = serde_json::from_str(body).map_err(|e| {
        debug!(body = %Error::truncate_body(body), "Authentication response is not JSON");
        Error::MalformedResponse(format!("authentication response is not JSON: {}", e))
    })?;

    match json.pointer("/payload/vehicleSummary/0/vehicleKey") {
        Some(Value::String(key)) if !key.is_empty() => Ok(key.clone()),
        _ => {
            debug!(body = %Error::truncate_body(body), "No vehicle key in response");
            Err(Error::Auth("no vehicle key in authentication response".to_string()))
        }
    }
}

/// GPS coordinates of the vehicle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// Extract `payload.gpsDetail.coord.{lat,lon}` from a location response
pub fn parse_location(body: &str) -> Result<Location> {
    let json: Value = serde_json::from_str(body).map_err(|e| {
        Error::MalformedResponse(format!("location response is not JSON: {}", e))
    })?;

    let coord = json
        .pointer("/payload/gpsDetail/coord")
        .ok_or_else(|| Error::MalformedResponse("location response has no gpsDetail".into()))?;

    let lat = coord.get("lat").and_then(Value::as_f64);
    let lon = coord.get("lon").and_then(Value::as_f64);
    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok(Location { lat, lon }),
        _ => Err(Error::MalformedResponse(
            "location response has no usable coordinates".into(),
        )),
    }
}

/// One `(statusCode, errorType, errorCode)` triple the portal uses to say
/// the vehicle's daily command allowance is used up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSignature {
    pub status_code: i64,
    pub error_type: i64,
    pub error_code: i64,
}

impl StatusSignature {
    pub const fn new(status_code: i64, error_type: i64, error_code: i64) -> Self {
        Self {
            status_code,
            error_type,
            error_code,
        }
    }
}

/// Signatures observed from the portal so far. Not exhaustive: the error
/// vocabulary is undocumented, so the list is configurable.
pub const DEFAULT_DAILY_LIMIT_SIGNATURES: [StatusSignature; 2] = [
    StatusSignature::new(1, 1, 1126),
    StatusSignature::new(1, 1, 404),
];

/// Recognizes "daily command limit reached" responses.
#[derive(Debug, Clone)]
pub struct DailyLimitDetector {
    signatures: Vec<StatusSignature>,
}

impl DailyLimitDetector {
    pub fn new(signatures: Vec<StatusSignature>) -> Self {
        Self { signatures }
    }

    pub fn signatures(&self) -> &[StatusSignature] {
        &self.signatures
    }

    pub fn matches(&self, body: &str) -> bool {
        let Ok(json) = serde_json::from_str::<Value>(body) else {
            return false;
        };
        let Some(status) = json.get("status") else {
            return false;
        };
        let field = |name: &str| status.get(name).and_then(Value::as_i64);

        match (field("statusCode"), field("errorType"), field("errorCode")) {
            (Some(status_code), Some(error_type), Some(error_code)) => {
                let observed = StatusSignature::new(status_code, error_type, error_code);
                self.signatures.contains(&observed)
            }
            _ => false,
        }
    }
}

impl Default for DailyLimitDetector {
    fn default() -> Self {
        Self::new(DEFAULT_DAILY_LIMIT_SIGNATURES.to_vec())
    }
}
