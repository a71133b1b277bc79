//! # Client Transport
//!
//! The client's single WebSocket to the relay.
//!
//! ## Tasks:
//! - **writer**: sends queued outbound frames and a periodic ping
//! - **reader**: parses inbound frames into `ServerEnvelope`s and hands them
//!   to the channel returned by `connect`
//!
//! Sends are only accepted while the socket is open. Anything sent before
//! `connect` finishes or after `disconnect` is dropped and the send returns
//! `false`. Nothing is buffered for later.

use crate::protocol::{ClientEnvelope, EnvelopeError, ServerEnvelope};
use anyhow::{anyhow, bail, Context, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How often the writer pings the relay, well inside the relay's timeout.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(20);

/// Relay socket URL for the page origin it is served from:
/// `http://host` → `ws://host/ws`, `https://host` → `wss://host/ws`.
pub fn ws_url_for_origin(origin: &str) -> Result<String> {
    let origin = origin.trim().trim_end_matches('/');
    let base = if let Some(rest) = origin.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = origin.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if origin.starts_with("ws://") || origin.starts_with("wss://") {
        origin.to_string()
    } else {
        bail!("Unsupported origin '{}', expected http(s):// or ws(s)://", origin);
    };
    Ok(format!("{}/ws", base))
}

/// Cloneable handle to one relay connection.
#[derive(Clone)]
pub struct ClientTransport {
    inner: Arc<Inner>,
}

struct Inner {
    open: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<Message>,
    /// Receiving end for the writer task, taken on connect
    pending: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
    heartbeat: Duration,
}

impl Default for ClientTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientTransport {
    pub fn new() -> Self {
        Self::with_heartbeat(DEFAULT_HEARTBEAT)
    }

    pub fn with_heartbeat(heartbeat: Duration) -> Self {
        let (outbound, pending) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                open: Arc::new(AtomicBool::new(false)),
                outbound,
                pending: Mutex::new(Some(pending)),
                heartbeat,
            }),
        }
    }

    /// Open the socket and start the reader and writer tasks. A transport
    /// connects once; make a new one to reconnect.
    pub async fn connect(&self, url: &str) -> Result<mpsc::UnboundedReceiver<ServerEnvelope>> {
        let (socket, _response) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to relay at {}", url))?;

        let outbound = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| anyhow!("Transport was already connected"))?;

        let (sink, stream) = socket.split();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        self.inner.open.store(true, Ordering::SeqCst);
        tokio::spawn(write_loop(sink, outbound, self.inner.heartbeat, self.inner.open.clone()));
        tokio::spawn(read_loop(stream, inbound_tx, self.inner.open.clone()));

        info!(url = %url, "Connected to relay");
        Ok(inbound_rx)
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Send one captured frame (base64 PCM16). `false` if not connected.
    pub fn send_audio_frame(&self, data: String) -> bool {
        self.send_envelope(&ClientEnvelope::Audio { data })
    }

    pub fn send_start(&self) -> bool {
        self.send_envelope(&ClientEnvelope::Start)
    }

    /// Send a close frame and stop accepting sends.
    pub fn disconnect(&self) {
        if self.inner.open.swap(false, Ordering::SeqCst) {
            let _ = self.inner.outbound.send(Message::Close(None));
            info!("Disconnected from relay");
        }
    }

    fn send_envelope(&self, envelope: &ClientEnvelope) -> bool {
        match envelope.to_json() {
            Ok(json) => self.send_frame(Message::Text(json)),
            Err(err) => {
                warn!(error = %err, "Failed to serialize envelope");
                false
            }
        }
    }

    fn send_frame(&self, frame: Message) -> bool {
        if !self.is_open() {
            debug!("Not connected, dropping outbound frame");
            return false;
        }
        self.inner.outbound.send(frame).is_ok()
    }

    /// Raw text frame, for exercising the relay with arbitrary input.
    #[cfg(test)]
    pub(crate) fn send_text(&self, text: &str) -> bool {
        self.send_frame(Message::Text(text.to_string()))
    }
}

async fn write_loop(
    mut sink: SplitSink<RelaySocket, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    heartbeat: Duration,
    open: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(heartbeat);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                let closing = matches!(frame, Message::Close(_));
                if let Err(err) = sink.send(frame).await {
                    warn!(error = %err, "Failed to send to relay");
                    break;
                }
                if closing {
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(err) = sink.send(Message::Ping(Vec::new())).await {
                    warn!(error = %err, "Heartbeat ping failed");
                    break;
                }
            }
        }
    }

    open.store(false, Ordering::SeqCst);
    debug!("Relay writer stopped");
}

async fn read_loop(
    mut stream: SplitStream<RelaySocket>,
    inbound: mpsc::UnboundedSender<ServerEnvelope>,
    open: Arc<AtomicBool>,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match ServerEnvelope::parse(&text) {
                Ok(envelope) => {
                    if inbound.send(envelope).is_err() {
                        debug!("Inbound receiver dropped, stopping reader");
                        break;
                    }
                }
                Err(EnvelopeError::Unhandled(kind)) => warn!(kind = %kind, "Unhandled envelope"),
                Err(err) => warn!(error = %err, "Ignoring invalid relay message"),
            },
            Ok(Message::Close(frame)) => {
                info!(frame = ?frame, "Relay closed the connection");
                break;
            }
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "Relay connection failed");
                break;
            }
        }
    }

    open.store(false, Ordering::SeqCst);
    debug!("Relay reader stopped");
}
