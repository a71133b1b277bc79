//! # Trip Records
//!
//! A Trip Record is the structured result of one completed conversation.
//! Records are built from the arguments of a `saveTrip` tool invocation and
//! are immutable afterwards.
//!
//! ## Validation policy:
//! The upstream model is instructed to call `saveTrip` only once every slot
//! is filled and the user confirmed the summary, but the relay does not rely
//! on that. `TripRecord::from_tool_args` is the only way to build a record
//! from model output, and it rejects:
//! - arguments that are not a JSON object
//! - a missing or blank required field (`client`, `driver`, `destination`,
//!   `tripType`, `date`)
//! - values outside the catalog (unknown client, driver, origin, or a
//!   destination that does not belong to the chosen client)
//! - an `origin` that is present but not a string
//! - a trip type that is not one of `outbound`, `return`, `round_trip`
//!
//! A rejected invocation is never appended to the store.

use crate::trips::catalog::{find_ignore_case, TripCatalog};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// JSON names of the fields the model must always provide.
pub const REQUIRED_FIELDS: [&str; 5] = ["client", "driver", "destination", "tripType", "date"];

/// Direction of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    /// One way, from the origin to the destination
    Outbound,
    /// One way, from the destination back
    Return,
    /// There and back again
    RoundTrip,
}

impl TripType {
    pub const ALL: [TripType; 3] = [TripType::Outbound, TripType::Return, TripType::RoundTrip];

    pub fn as_str(&self) -> &'static str {
        match self {
            TripType::Outbound => "outbound",
            TripType::Return => "return",
            TripType::RoundTrip => "round_trip",
        }
    }
}

impl fmt::Display for TripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "outbound" => Ok(TripType::Outbound),
            "return" => Ok(TripType::Return),
            "round_trip" | "roundtrip" => Ok(TripType::RoundTrip),
            _ => Err(format!("Unknown trip type: {}", s)),
        }
    }
}

/// One accepted trip, as stored and broadcast to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripRecord {
    pub client: String,
    pub driver: String,
    pub destination: String,
    pub trip_type: TripType,
    /// Free text as spoken ("today", "next Monday", "12 March")
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

/// Why a `saveTrip` invocation was not turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TripRejection {
    /// Tool arguments were not a JSON object
    InvalidArguments(String),
    /// A required field was absent, not a string, or blank
    MissingField(&'static str),
    InvalidTripType(String),
    UnknownClient(String),
    UnknownDriver(String),
    UnknownDestination { client: String, destination: String },
    UnknownOrigin(String),
}

impl fmt::Display for TripRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripRejection::InvalidArguments(msg) => write!(f, "invalid tool arguments: {}", msg),
            TripRejection::MissingField(field) => write!(f, "missing required field '{}'", field),
            TripRejection::InvalidTripType(value) => write!(
                f,
                "trip type '{}' is not one of outbound, return, round_trip",
                value
            ),
            TripRejection::UnknownClient(client) => write!(f, "unknown client '{}'", client),
            TripRejection::UnknownDriver(driver) => write!(f, "unknown driver '{}'", driver),
            TripRejection::UnknownDestination { client, destination } => write!(
                f,
                "destination '{}' is not valid for client '{}'",
                destination, client
            ),
            TripRejection::UnknownOrigin(origin) => write!(f, "unknown origin '{}'", origin),
        }
    }
}

impl std::error::Error for TripRejection {}

impl TripRecord {
    /// Build a record from `saveTrip` arguments, checked against the catalog.
    ///
    /// Catalog values are matched case-insensitively and stored with the
    /// catalog's own spelling, so every client sees consistent names.
    pub fn from_tool_args(args: &Value, catalog: &TripCatalog) -> Result<Self, TripRejection> {
        let fields = args.as_object().ok_or_else(|| {
            TripRejection::InvalidArguments(format!("expected an object, got {}", type_name(args)))
        })?;

        let client_name = required_str(fields, "client")?;
        let driver_name = required_str(fields, "driver")?;
        let destination_name = required_str(fields, "destination")?;
        let trip_type_raw = required_str(fields, "tripType")?;
        let date = required_str(fields, "date")?;

        let client = catalog
            .client(client_name)
            .ok_or_else(|| TripRejection::UnknownClient(client_name.to_string()))?;

        let driver = catalog
            .driver(driver_name)
            .ok_or_else(|| TripRejection::UnknownDriver(driver_name.to_string()))?;

        let destination = find_ignore_case(&client.destinations, destination_name).ok_or_else(|| {
            TripRejection::UnknownDestination {
                client: client.name.clone(),
                destination: destination_name.to_string(),
            }
        })?;

        let trip_type = trip_type_raw
            .parse::<TripType>()
            .map_err(|_| TripRejection::InvalidTripType(trip_type_raw.to_string()))?;

        let origin = optional_origin(fields, catalog)?;

        Ok(TripRecord {
            client: client.name.clone(),
            driver: driver.to_string(),
            destination: destination.to_string(),
            trip_type,
            date: date.to_string(),
            origin,
        })
    }
}

fn required_str<'a>(fields: &'a Map<String, Value>, name: &'static str) -> Result<&'a str, TripRejection> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(TripRejection::MissingField(name))
}

/// `origin` may be absent, null or blank (all meaning "not given"). Any
/// other value must be a string naming a catalog origin.
fn optional_origin(fields: &Map<String, Value>, catalog: &TripCatalog) -> Result<Option<String>, TripRejection> {
    let value = match fields.get("origin") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(value)) => value.trim(),
        Some(other) => {
            return Err(TripRejection::InvalidArguments(format!(
                "origin must be a string, got {}",
                type_name(other)
            )))
        }
    };

    if value.is_empty() {
        return Ok(None);
    }

    catalog
        .origin(value)
        .map(|origin| Some(origin.to_string()))
        .ok_or_else(|| TripRejection::UnknownOrigin(value.to_string()))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
