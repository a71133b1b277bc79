//! # Voice Trip Relay
//!
//! A WebSocket relay between browser-style audio clients and a realtime
//! conversational speech service. The service interviews the user for the
//! details of a trip and calls the `saveTrip` tool; the relay validates the
//! call, stores the trip and broadcasts the updated list to every client.
//!
//! ## Application Architecture:
//! - **config**: configuration (defaults, `config.toml`, environment variables)
//! - **state**: shared application state and counters
//! - **server**: routes and middleware
//! - **websocket**: one relay actor per client socket
//! - **upstream**: the conversational speech service boundary
//! - **prompt**: system prompt and tool declaration for each session
//! - **trips**: trip records, validation, the store and the hub actor
//! - **protocol**: the JSON envelopes exchanged with clients
//! - **audio**: PCM16/base64 conversions and sequential playback
//! - **client**: the client side of the protocol, used by `trip-client`
//! - **health**, **handlers**, **middleware**, **error**: HTTP surface

pub mod audio;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod health;
pub mod middleware;
pub mod prompt;
pub mod protocol;
pub mod server;
pub mod state;
pub mod trips;
pub mod upstream;
pub mod websocket;
