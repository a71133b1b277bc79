//! # Audio
//!
//! Sample-format helpers shared by the relay and its client.
//!
//! ## Audio Format:
//! - **Encoding**: 16-bit signed PCM, little-endian, mono
//! - **Capture**: 16 kHz, frames of 4096 samples
//! - **Playback**: 24 kHz, as produced by the upstream voice
//! - **Transport**: base64 text inside JSON envelopes

pub mod codec; // f32 <-> PCM16 <-> base64
pub mod playback; // Sequential playback of synthesized chunks

pub use codec::{decode_frame, encode_frame, PlayableBuffer};
pub use playback::{PlaybackQueue, PlaybackSink, PlaybackState};
