//! Remote command table and response interpretation.

pub mod command;
pub mod response;

pub use command::{Command, CommandParams, LOCATION_REQUEST_BODY};
pub use response::{
    is_success, parse_location, parse_vehicle_key, DailyLimitDetector, Location, StatusSignature,
    DEFAULT_DAILY_LIMIT_SIGNATURES, SUCCESS_MARKER,
};
