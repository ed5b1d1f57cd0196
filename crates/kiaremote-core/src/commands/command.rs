use serde_json::{json, Value};

use crate::error::{Error, Result};

/// The closed set of remote commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LockDoors,
    UnlockDoors,
    StartClimate { temp: String, defrost: bool },
    GetStatus,
    GetLocation,
}

/// Optional parameters that accompany a command code
#[derive(Debug, Clone, Default)]
pub struct CommandParams {
    pub temp: Option<String>,
    pub defrost: Option<String>,
}

impl Command {
    /// Validate a command code against the command table.
    ///
    /// | code | command |
    /// |------|---------|
    /// | 1 | lock doors |
    /// | 2 | unlock doors |
    /// | 3 | start climate (needs `temp` and `defrost`) |
    /// | 5 | full vehicle status |
    /// | 6 | GPS location |
    pub fn from_code(code: &str, params: &CommandParams) -> Result<Self> {
        match code.trim() {
            "1" => Ok(Command::LockDoors),
            "2" => Ok(Command::UnlockDoors),
            "3" => {
                let temp = params
                    .temp
                    .as_deref()
                    .ok_or_else(|| Error::InvalidCommand("climate control requires temp".into()))?;
                // Passed through as-is: the portal also accepts LO, HI and half degrees
                let temp = temp.trim();
                if temp.is_empty() {
                    return Err(Error::InvalidCommand("temp must not be empty".into()));
                }
                let temp = temp.to_string();
                let defrost = params
                    .defrost
                    .as_deref()
                    .ok_or_else(|| Error::InvalidCommand("climate control requires defrost".into()))
                    .and_then(parse_flag)?;
                Ok(Command::StartClimate { temp, defrost })
            }
            "5" => Ok(Command::GetStatus),
            "6" => Ok(Command::GetLocation),
            other => Err(Error::InvalidCommand(format!("unknown command code {:?}", other))),
        }
    }

    /// Human-readable name for logs
    pub fn display_name(&self) -> &'static str {
        match self {
            Command::LockDoors => "Lock Doors",
            Command::UnlockDoors => "Unlock Doors",
            Command::StartClimate { .. } => "Start Climate Control",
            Command::GetStatus => "Get Vehicle Status",
            Command::GetLocation => "Get Vehicle Location",
        }
    }

    /// Location queries use their own endpoint and body
    pub fn is_location(&self) -> bool {
        matches!(self, Command::GetLocation)
    }

    /// The action envelope for vehicle commands; `None` for the location query
    pub fn action_payload(&self) -> Option<Value> {
        let payload = match self {
            Command::LockDoors => json!({ "action": "ACTION_EXEC_REMOTE_LOCK_DOORS" }),
            Command::UnlockDoors => json!({ "action": "ACTION_EXEC_REMOTE_UNLOCK_DOORS" }),
            Command::StartClimate { temp, defrost } => json!({
                "action": "ACTION_EXEC_REMOTE_CLIMATE_ON",
                "remoteClimate": {
                    "airTemp": { "value": temp, "unit": 1 },
                    "airCtrl": true,
                    "defrost": defrost,
                    "ventilationWarning": false,
                    "ignitionOnDuration": { "value": "10", "unit": 4 },
                    "heatingAccessory": {
                        "steeringWheel": 0,
                        "sideMirror": 0,
                        "rearWindow": 0
                    }
                }
            }),
            Command::GetStatus => {
                json!({ "action": "ACTION_GET_LAST_REFRESHED_STATUS_FULL_LOOP" })
            }
            Command::GetLocation => return None,
        };
        Some(payload)
    }
}

/// Fixed body of the location query
pub const LOCATION_REQUEST_BODY: &str = r#"{"requestType":0}"#;

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(Error::InvalidCommand(format!(
            "defrost must be true or false, got {:?}",
            other
        ))),
    }
}
