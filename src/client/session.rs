//! # Client Session
//!
//! What a connected client shows the user, driven entirely by the
//! envelopes the relay sends:
//! - `status` / `log` → transcript lines, most recent first
//! - `trips_update` → replaces the trips table
//! - `audio` → decoded and queued for sequential playback

use crate::audio::codec::decode_frame;
use crate::audio::playback::{PlaybackQueue, PlaybackSink};
use crate::client::capture::{CaptureHandle, FrameCapture};
use crate::client::transport::ClientTransport;
use crate::protocol::ServerEnvelope;
use crate::trips::record::TripRecord;
use anyhow::Result;
use std::collections::VecDeque;
use tokio::sync::mpsc;
use tracing::warn;

/// Transcript lines kept; older ones fall off the end.
pub const TRANSCRIPT_LIMIT: usize = 200;

pub struct ClientSession<S: PlaybackSink> {
    transport: ClientTransport,
    transcript: VecDeque<String>,
    trips: Vec<TripRecord>,
    playback: PlaybackQueue<S>,
    capture: Option<CaptureHandle>,
}

impl<S: PlaybackSink> ClientSession<S> {
    pub fn new(transport: ClientTransport, sink: S) -> Self {
        Self {
            transport,
            transcript: VecDeque::new(),
            trips: Vec::new(),
            playback: PlaybackQueue::new(sink),
            capture: None,
        }
    }

    /// Connect and announce the session with `start`.
    pub async fn connect(&mut self, url: &str) -> Result<mpsc::UnboundedReceiver<ServerEnvelope>> {
        let inbound = self.transport.connect(url).await?;
        self.transport.send_start();
        Ok(inbound)
    }

    pub fn start_capture(&mut self, capture: FrameCapture) {
        if let Some(previous) = self.capture.replace(capture.start(self.transport.clone())) {
            previous.stop();
        }
    }

    pub fn dispatch(&mut self, envelope: ServerEnvelope) {
        match envelope {
            ServerEnvelope::Status { message } | ServerEnvelope::Log { message } => {
                self.push_transcript(message);
            }
            ServerEnvelope::TripsUpdate { trips } => self.trips = trips,
            ServerEnvelope::Audio { data } => match decode_frame(&data) {
                Ok(buffer) => self.playback.enqueue(buffer),
                Err(err) => warn!("Dropping undecodable audio chunk: {:#}", err),
            },
        }
    }

    pub fn on_playback_finished(&mut self) {
        self.playback.on_finished();
    }

    /// Stop capture, close the socket and the playback device.
    pub fn disconnect(&mut self) {
        if let Some(capture) = self.capture.take() {
            capture.stop();
        }
        self.transport.disconnect();
        self.playback.close();
    }

    pub fn transcript(&self) -> &VecDeque<String> {
        &self.transcript
    }

    pub fn trips(&self) -> &[TripRecord] {
        &self.trips
    }

    pub fn playback(&self) -> &PlaybackQueue<S> {
        &self.playback
    }

    fn push_transcript(&mut self, line: String) {
        self.transcript.push_front(line);
        self.transcript.truncate(TRANSCRIPT_LIMIT);
    }
}
