//! # Gemini Live Connector
//!
//! The concrete `UpstreamConnector` for the Gemini Live API.
//!
//! ## Session lifecycle:
//! 1. Open a TLS WebSocket to the configured endpoint, with the API key in
//!    the `x-goog-api-key` request header
//! 2. Send the `setup` message
//! 3. Wait (bounded by `setup_timeout_secs`) for `setupComplete`
//! 4. Hand the relay an `UpstreamSession` and move the socket into a
//!    background task that pumps commands out and events in
//!
//! The task ends when the relay sends `Close`, drops its handle, or the
//! remote side goes away. It always finishes by emitting `Closed`.
//!
//! The API key only ever travels in that header. It is never part of the URL
//! and never logged.

use crate::config::UpstreamConfig;
use crate::upstream::wire::{self, EventTranslator};
use crate::upstream::{
    SessionChannels, SessionSetup, UpstreamCommand, UpstreamConnector, UpstreamEvent, UpstreamSession,
};
use anyhow::{anyhow, bail, Context, Result};
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type GeminiSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Header the Live API reads the credential from.
pub const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiLiveConnector {
    endpoint: String,
    api_key: String,
    setup_timeout: Duration,
}

impl GeminiLiveConnector {
    pub fn new(config: &UpstreamConfig, api_key: String) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key,
            setup_timeout: Duration::from_secs(config.setup_timeout_secs),
        }
    }

    /// Handshake request for one session: the configured endpoint as is,
    /// plus the credential header.
    fn session_request(&self) -> Result<Request> {
        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .with_context(|| format!("Invalid upstream endpoint {}", self.endpoint))?;

        let mut key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| anyhow!("API key contains characters that cannot be sent in a header"))?;
        key.set_sensitive(true);
        request.headers_mut().insert(API_KEY_HEADER, key);

        Ok(request)
    }
}

impl std::fmt::Debug for GeminiLiveConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiLiveConnector")
            .field("endpoint", &self.endpoint)
            .field("setup_timeout", &self.setup_timeout)
            .finish_non_exhaustive()
    }
}

impl UpstreamConnector for GeminiLiveConnector {
    fn connect(&self, setup: SessionSetup) -> BoxFuture<'static, Result<UpstreamSession>> {
        let request = self.session_request();
        let endpoint = self.endpoint.clone();
        let setup_timeout = self.setup_timeout;
        Box::pin(async move { open_session(request?, endpoint, setup, setup_timeout).await })
    }
}

async fn open_session(
    request: Request,
    endpoint: String,
    setup: SessionSetup,
    setup_timeout: Duration,
) -> Result<UpstreamSession> {
    let setup_frame = wire::encode_setup(&setup).context("Failed to encode session setup")?;

    debug!(endpoint = %endpoint, model = %setup.model, "Connecting to upstream");
    let (mut socket, _response) = connect_async(request)
        .await
        .with_context(|| format!("Failed to connect to {}", endpoint))?;

    socket
        .send(Message::Text(setup_frame))
        .await
        .context("Failed to send session setup")?;

    tokio::time::timeout(setup_timeout, wait_for_setup_complete(&mut socket))
        .await
        .map_err(|_| anyhow!("No setupComplete within {:?}", setup_timeout))??;

    info!(model = %setup.model, voice = %setup.voice, "Upstream session established");

    let (session, channels) = UpstreamSession::channel();
    let _ = channels.events.send(UpstreamEvent::Opened);
    tokio::spawn(drive_session(socket, channels));
    Ok(session)
}

async fn wait_for_setup_complete(socket: &mut GeminiSocket) -> Result<()> {
    while let Some(frame) = socket.next().await {
        let frame = frame.context("Upstream socket failed during setup")?;
        if let Message::Close(close) = &frame {
            bail!("Upstream closed during setup: {}", describe_close(close.as_ref()));
        }
        let Some(text) = frame_text(&frame) else {
            continue;
        };
        let message = wire::decode_server_message(text).context("Invalid message during setup")?;
        if message.setup_complete.is_some() {
            return Ok(());
        }
        debug!("Ignoring upstream message received before setupComplete");
    }
    bail!("Upstream closed before setupComplete")
}

/// Pump commands to the socket and socket frames to events until either
/// side ends.
async fn drive_session(socket: GeminiSocket, channels: SessionChannels) {
    let SessionChannels { mut commands, events } = channels;
    let (mut sink, mut stream) = socket.split();
    let mut translator = EventTranslator::new();

    let reason = loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(UpstreamCommand::Close) | None => {
                    if let Err(err) = sink.send(Message::Close(None)).await {
                        debug!(error = %err, "Upstream close frame not delivered");
                    }
                    break "closed by relay".to_string();
                }
                Some(command) => match wire::encode_command(&command) {
                    Ok(Some(frame)) => {
                        if let Err(err) = sink.send(Message::Text(frame)).await {
                            let _ = events.send(UpstreamEvent::Errored(format!("send failed: {}", err)));
                            break "upstream send failed".to_string();
                        }
                    }
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "Failed to encode upstream command"),
                },
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Close(close))) => break describe_close(close.as_ref()),
                Some(Ok(frame)) => {
                    if let Some(text) = frame_text(&frame) {
                        forward_server_message(text, &mut translator, &events);
                    }
                }
                Some(Err(err)) => {
                    let _ = events.send(UpstreamEvent::Errored(err.to_string()));
                    break "upstream socket error".to_string();
                }
                None => break "upstream socket ended".to_string(),
            },
        }
    };

    info!(reason = %reason, "Upstream session closed");
    let _ = events.send(UpstreamEvent::Closed { reason });
}

fn forward_server_message(
    text: &str,
    translator: &mut EventTranslator,
    events: &mpsc::UnboundedSender<UpstreamEvent>,
) {
    let message = match wire::decode_server_message(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(error = %err, "Skipping undecodable upstream message");
            return;
        }
    };

    if let Some(go_away) = &message.go_away {
        warn!(time_left = ?go_away.time_left, "Upstream announced disconnect");
    }

    for event in translator.translate(message) {
        let _ = events.send(event);
    }
}

/// Server messages arrive as text or as binary frames holding UTF-8 JSON.
fn frame_text(frame: &Message) -> Option<&str> {
    match frame {
        Message::Text(text) => Some(text.as_str()),
        Message::Binary(bytes) => std::str::from_utf8(bytes).ok(),
        _ => None,
    }
}

fn describe_close(frame: Option<&CloseFrame<'_>>) -> String {
    match frame {
        Some(frame) if !frame.reason.is_empty() => format!("{} ({})", frame.reason, u16::from(frame.code)),
        Some(frame) => format!("close code {}", u16::from(frame.code)),
        None => "closed by upstream".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::FunctionResponse;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request as ServerRequest, Response};

    fn config(endpoint: &str) -> UpstreamConfig {
        UpstreamConfig {
            endpoint: endpoint.to_string(),
            model: "gemini-2.0-flash-live-001".to_string(),
            voice: "Puck".to_string(),
            setup_timeout_secs: 2,
        }
    }

    fn setup() -> SessionSetup {
        SessionSetup {
            model: "gemini-2.0-flash-live-001".to_string(),
            voice: "Puck".to_string(),
            system_prompt: "Collect trips.".to_string(),
            tools: Vec::new(),
        }
    }

    async fn next_json(socket: &mut WebSocketStream<TcpStream>) -> Value {
        loop {
            match socket.next().await.unwrap().unwrap() {
                Message::Text(text) => return serde_json::from_str(&text).unwrap(),
                Message::Close(_) => panic!("socket closed"),
                _ => continue,
            }
        }
    }

    async fn next_event(session: &mut UpstreamSession) -> UpstreamEvent {
        tokio::time::timeout(Duration::from_secs(2), session.events.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_api_key_travels_in_header_not_url() {
        let connector = GeminiLiveConnector::new(&config("wss://example.test/live?alt=json"), "a&b=c+d/e".to_string());
        let request = connector.session_request().unwrap();

        assert_eq!(request.uri().to_string(), "wss://example.test/live?alt=json");
        assert_eq!(request.headers()[API_KEY_HEADER], "a&b=c+d/e");
        assert!(request.headers()[API_KEY_HEADER].is_sensitive());
        assert!(!format!("{:?}", connector).contains("a&b=c+d/e"));
    }

    #[tokio::test]
    async fn test_api_key_unfit_for_header_is_an_error() {
        let connector = GeminiLiveConnector::new(&config("wss://example.test/live"), "line\nbreak".to_string());
        let err = connector.connect(setup()).await.unwrap_err();

        assert!(err.to_string().contains("header"));
        assert!(!err.to_string().contains("break"));
    }

    #[tokio::test]
    async fn test_session_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut seen_key = None;
            let mut seen_query = None;
            let mut socket = accept_hdr_async(stream, |request: &ServerRequest, response: Response| -> Result<Response, ErrorResponse> {
                seen_key = request
                    .headers()
                    .get(API_KEY_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                seen_query = request.uri().query().map(str::to_string);
                Ok(response)
            })
            .await
            .unwrap();
            assert_eq!(seen_key.as_deref(), Some("test-key"));
            assert_eq!(seen_query, None);

            let setup = next_json(&mut socket).await;
            assert_eq!(setup["setup"]["model"], "models/gemini-2.0-flash-live-001");
            socket
                .send(Message::Binary(br#"{"setupComplete":{}}"#.to_vec()))
                .await
                .unwrap();

            let audio = next_json(&mut socket).await;
            assert_eq!(audio["realtimeInput"]["audio"]["data"], "AAAA");

            socket
                .send(Message::Text(
                    json!({"toolCall": {"functionCalls": [
                        {"id": "fc-1", "name": "saveTrip", "args": {"driver": "Maria"}}
                    ]}})
                    .to_string(),
                ))
                .await
                .unwrap();

            let response = next_json(&mut socket).await;
            assert_eq!(response["toolResponse"]["functionResponses"][0]["id"], "fc-1");

            // wait for the relay's close frame
            while let Some(Ok(frame)) = socket.next().await {
                if matches!(frame, Message::Close(_)) {
                    break;
                }
            }
        });

        let connector = GeminiLiveConnector::new(&config(&format!("ws://{}/live", addr)), "test-key".to_string());
        let mut session = connector.connect(setup()).await.unwrap();
        assert_eq!(next_event(&mut session).await, UpstreamEvent::Opened);

        session
            .handle
            .send_realtime_input("AAAA".to_string(), "audio/pcm;rate=16000")
            .unwrap();

        let calls = match next_event(&mut session).await {
            UpstreamEvent::ToolCall(calls) => calls,
            other => panic!("unexpected event: {:?}", other),
        };
        assert_eq!(calls[0].args["driver"], "Maria");

        session
            .handle
            .send_tool_response(vec![FunctionResponse::for_call(&calls[0], json!({"result": "ok"}))])
            .unwrap();
        session.handle.close().unwrap();

        assert_eq!(
            next_event(&mut session).await,
            UpstreamEvent::Closed {
                reason: "closed by relay".to_string()
            }
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_setup_timeout_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut socket = accept_async(stream).await.unwrap();
            // read the setup but never acknowledge it
            let _ = next_json(&mut socket).await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut config = config(&format!("ws://{}/live", addr));
        config.setup_timeout_secs = 1;
        let connector = GeminiLiveConnector::new(&config, "test-key".to_string());

        let err = connector.connect(setup()).await.unwrap_err();
        assert!(err.to_string().contains("setupComplete"));
    }
}
