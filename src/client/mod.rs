//! # Relay Client
//!
//! The client side of the relay protocol, used by the `trip-client` binary:
//! - **transport**: the WebSocket to the relay
//! - **session**: transcript, trips table and playback driven by envelopes
//! - **capture**: paced capture frames from a WAV file
//! - **recorder**: a playback sink that records synthesized speech

pub mod capture;
pub mod recorder;
pub mod session;
pub mod transport;

pub use capture::{CaptureHandle, FrameCapture};
pub use recorder::PacedRecorder;
pub use session::ClientSession;
pub use transport::{ws_url_for_origin, ClientTransport};
