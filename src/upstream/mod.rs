//! # Upstream Session Adapter
//!
//! The boundary to the external conversational speech service. Nothing in
//! the relay talks to the service directly; connection actors only see the
//! types in this module.
//!
//! ## Contract:
//! - `UpstreamConnector::connect(setup)` opens one session configured with a
//!   model, a voice, a system prompt and tool declarations
//! - the returned `UpstreamSession` carries an `UpstreamHandle` for sending
//!   (`send_realtime_input`, `send_tool_response`, `close`) and an explicit
//!   stream of `UpstreamEvent`s with exactly one consumer
//! - dropping the handle ends the session just like `close()`
//!
//! ## Channels:
//! The concrete adapter runs its socket in its own task. Commands and events
//! cross that task boundary over unbounded mpsc channels; forwarding audio
//! never blocks the connection actor.

pub mod gemini;
pub mod wire;

use anyhow::{anyhow, Result};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

pub use gemini::GeminiLiveConnector;

/// Everything needed to open one upstream conversational session.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    pub model: String,
    pub voice: String,
    pub system_prompt: String,
    pub tools: Vec<FunctionDeclaration>,
}

/// A tool the upstream model may invoke.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    /// OpenAPI-style schema of the arguments object
    pub parameters: Value,
}

/// One tool invocation requested by the upstream model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Correlation id; must be echoed back in the response
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// The relay's answer to a `FunctionCall`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: Value,
}

impl FunctionResponse {
    pub fn for_call(call: &FunctionCall, response: Value) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            response,
        }
    }
}

/// Requests from the relay to the upstream session.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamCommand {
    /// A base64 audio chunk, forwarded unchanged
    RealtimeAudio { data: String, mime_type: String },
    ToolResponse(Vec<FunctionResponse>),
    Close,
}

/// What the upstream session reports back.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// Setup finished, the session accepts input
    Opened,
    /// Synthesized speech, base64 PCM16
    Audio { data: String, mime_type: String },
    /// Model text or a finished transcript of what the model said
    Text(String),
    ToolCall(Vec<FunctionCall>),
    Closed { reason: String },
    Errored(String),
}

/// Sending half of an upstream session. Cheap to clone.
#[derive(Debug, Clone)]
pub struct UpstreamHandle {
    commands: mpsc::UnboundedSender<UpstreamCommand>,
}

impl UpstreamHandle {
    pub fn new(commands: mpsc::UnboundedSender<UpstreamCommand>) -> Self {
        Self { commands }
    }

    pub fn send_realtime_input(&self, data: String, mime_type: &str) -> Result<()> {
        self.send(UpstreamCommand::RealtimeAudio {
            data,
            mime_type: mime_type.to_string(),
        })
    }

    pub fn send_tool_response(&self, responses: Vec<FunctionResponse>) -> Result<()> {
        self.send(UpstreamCommand::ToolResponse(responses))
    }

    pub fn close(&self) -> Result<()> {
        self.send(UpstreamCommand::Close)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: UpstreamCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| anyhow!("upstream session is no longer running"))
    }
}

/// An open upstream session: a handle for commands plus the event stream.
#[derive(Debug)]
pub struct UpstreamSession {
    pub handle: UpstreamHandle,
    pub events: mpsc::UnboundedReceiver<UpstreamEvent>,
}

/// The adapter-side ends of a session's channels.
#[derive(Debug)]
pub struct SessionChannels {
    pub commands: mpsc::UnboundedReceiver<UpstreamCommand>,
    pub events: mpsc::UnboundedSender<UpstreamEvent>,
}

impl UpstreamSession {
    /// Create a connected pair: the session handed to the relay and the
    /// channel ends the adapter drives.
    pub fn channel() -> (Self, SessionChannels) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                handle: UpstreamHandle::new(command_tx),
                events: event_rx,
            },
            SessionChannels {
                commands: command_rx,
                events: event_tx,
            },
        )
    }
}

/// Opens upstream sessions. One call per accepted client connection.
pub trait UpstreamConnector: Send + Sync {
    fn connect(&self, setup: SessionSetup) -> BoxFuture<'static, Result<UpstreamSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handle_forwards_commands_in_order() {
        let (session, mut channels) = UpstreamSession::channel();

        session
            .handle
            .send_realtime_input("AAAA".to_string(), "audio/pcm;rate=16000")
            .unwrap();
        let call = FunctionCall {
            id: Some("call-1".to_string()),
            name: "saveTrip".to_string(),
            args: json!({}),
        };
        session
            .handle
            .send_tool_response(vec![FunctionResponse::for_call(&call, json!({"result": "ok"}))])
            .unwrap();
        session.handle.close().unwrap();

        assert_eq!(
            channels.commands.try_recv().unwrap(),
            UpstreamCommand::RealtimeAudio {
                data: "AAAA".to_string(),
                mime_type: "audio/pcm;rate=16000".to_string()
            }
        );
        match channels.commands.try_recv().unwrap() {
            UpstreamCommand::ToolResponse(responses) => {
                assert_eq!(responses[0].id.as_deref(), Some("call-1"));
                assert_eq!(responses[0].name, "saveTrip");
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(channels.commands.try_recv().unwrap(), UpstreamCommand::Close);
    }

    #[test]
    fn test_sending_after_adapter_exit_is_an_error() {
        let (session, channels) = UpstreamSession::channel();
        drop(channels);

        assert!(session.handle.is_closed());
        assert!(session.handle.close().is_err());
    }
}
