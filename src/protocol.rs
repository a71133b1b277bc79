//! # WebSocket Envelope Protocol
//!
//! Every message between a client and the relay is a JSON text frame shaped
//! `{type, ...payload}`. Each direction is a closed set of envelope kinds,
//! modelled as a tagged enum and matched exhaustively where it is handled.
//!
//! ## Client → Server:
//! - `{type:'audio', data}`: base64 PCM16 mono, 16 kHz
//! - `{type:'start'}`: acknowledgment only, the session is already live
//!
//! ## Server → Client:
//! - `{type:'status', message}`
//! - `{type:'log', message}`
//! - `{type:'trips_update', trips:[...]}`
//! - `{type:'audio', data}`: base64 PCM16 mono, 24 kHz
//!
//! ## Parsing:
//! Unknown `type` tags are rejected with `EnvelopeError::Unhandled` rather
//! than skipped, so callers can log a distinct "unhandled envelope"
//! diagnostic instead of lumping it in with malformed JSON.

use crate::trips::record::TripRecord;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Messages a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEnvelope {
    /// One captured audio frame
    Audio { data: String },
    /// Sent once after the socket opens
    Start,
}

/// Messages the relay sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEnvelope {
    Status { message: String },
    Log { message: String },
    /// Full snapshot of every accepted trip, in acceptance order
    TripsUpdate { trips: Vec<TripRecord> },
    /// One chunk of synthesized speech
    Audio { data: String },
}

/// Why an incoming text frame could not be turned into an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Not valid JSON at all
    Malformed(String),
    /// Valid JSON without a string `type` field
    MissingType,
    /// A `type` this side of the protocol does not handle
    Unhandled(String),
    /// Known `type`, but the payload fields are wrong
    InvalidPayload { kind: String, reason: String },
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeError::Malformed(msg) => write!(f, "malformed envelope: {}", msg),
            EnvelopeError::MissingType => write!(f, "envelope has no 'type' field"),
            EnvelopeError::Unhandled(kind) => write!(f, "unhandled envelope type '{}'", kind),
            EnvelopeError::InvalidPayload { kind, reason } => {
                write!(f, "invalid '{}' envelope: {}", kind, reason)
            }
        }
    }
}

impl std::error::Error for EnvelopeError {}

impl ClientEnvelope {
    pub const KINDS: &'static [&'static str] = &["audio", "start"];

    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        parse_tagged(text, Self::KINDS)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl ServerEnvelope {
    pub const KINDS: &'static [&'static str] = &["status", "log", "trips_update", "audio"];

    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        parse_tagged(text, Self::KINDS)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn status(message: impl Into<String>) -> Self {
        ServerEnvelope::Status { message: message.into() }
    }

    pub fn log(message: impl Into<String>) -> Self {
        ServerEnvelope::Log { message: message.into() }
    }
}

/// Check the tag against the known kinds before handing the value to serde,
/// so an unknown kind never gets reported as a payload error.
fn parse_tagged<T: DeserializeOwned>(text: &str, kinds: &[&str]) -> Result<T, EnvelopeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(EnvelopeError::MissingType)?
        .to_string();

    if !kinds.contains(&kind.as_str()) {
        return Err(EnvelopeError::Unhandled(kind));
    }

    serde_json::from_value(value).map_err(|e| EnvelopeError::InvalidPayload {
        kind,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trips::record::TripType;

    #[test]
    fn test_client_envelopes_parse() {
        assert_eq!(
            ClientEnvelope::parse(r#"{"type":"audio","data":"AAAA"}"#),
            Ok(ClientEnvelope::Audio { data: "AAAA".to_string() })
        );
        assert_eq!(ClientEnvelope::parse(r#"{"type":"start"}"#), Ok(ClientEnvelope::Start));
    }

    #[test]
    fn test_unknown_tag_is_reported_as_unhandled() {
        assert_eq!(
            ClientEnvelope::parse(r#"{"type":"video","data":"AAAA"}"#),
            Err(EnvelopeError::Unhandled("video".to_string()))
        );
        // a server-only kind is not something clients may send
        assert_eq!(
            ClientEnvelope::parse(r#"{"type":"trips_update","trips":[]}"#),
            Err(EnvelopeError::Unhandled("trips_update".to_string()))
        );
    }

    #[test]
    fn test_malformed_and_untyped_input() {
        assert!(matches!(
            ClientEnvelope::parse("{not json"),
            Err(EnvelopeError::Malformed(_))
        ));
        assert_eq!(
            ClientEnvelope::parse(r#"{"data":"AAAA"}"#),
            Err(EnvelopeError::MissingType)
        );
        assert!(matches!(
            ClientEnvelope::parse(r#"{"type":"audio"}"#),
            Err(EnvelopeError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_server_envelope_wire_shape() {
        let trips = vec![TripRecord {
            client: "Acme Logistics".to_string(),
            driver: "Carlos".to_string(),
            destination: "North Depot".to_string(),
            trip_type: TripType::Return,
            date: "today".to_string(),
            origin: Some("Airport".to_string()),
        }];
        let json = ServerEnvelope::TripsUpdate { trips }.to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "trips_update");
        assert_eq!(value["trips"][0]["tripType"], "return");
        assert_eq!(value["trips"][0]["origin"], "Airport");

        let status = ServerEnvelope::status("ready").to_json().unwrap();
        assert_eq!(status, r#"{"type":"status","message":"ready"}"#);
    }
}
