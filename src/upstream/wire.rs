//! # Gemini Live Wire Format
//!
//! JSON shapes of the Gemini Live `BidiGenerateContent` WebSocket protocol,
//! limited to what the relay uses.
//!
//! ## Outgoing:
//! - `{"setup": {...}}` once, right after the socket opens
//! - `{"realtimeInput": {"audio": {"mimeType", "data"}}}` per audio frame
//! - `{"toolResponse": {"functionResponses": [...]}}` per answered tool call
//!
//! ## Incoming:
//! - `setupComplete`
//! - `serverContent` with `modelTurn.parts` (inline audio or text),
//!   `outputTranscription`, `turnComplete`, `interrupted`
//! - `toolCall.functionCalls`
//! - `goAway`

use crate::upstream::{FunctionCall, FunctionDeclaration, FunctionResponse, SessionSetup, UpstreamCommand, UpstreamEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum ClientMessage<'a> {
    Setup(Setup<'a>),
    RealtimeInput(RealtimeInput<'a>),
    ToolResponse(ToolResponse<'a>),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Setup<'a> {
    model: String,
    generation_config: GenerationConfig<'a>,
    system_instruction: SystemInstruction<'a>,
    tools: Vec<Tool<'a>>,
    /// Ask for a text transcript of the synthesized speech
    output_audio_transcription: EmptyConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: [&'static str; 1],
    speech_config: SpeechConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoiceConfig<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig<'a> {
    voice_name: &'a str,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool<'a> {
    function_declarations: &'a [FunctionDeclaration],
}

#[derive(Serialize)]
struct EmptyConfig {}

#[derive(Serialize)]
struct RealtimeInput<'a> {
    audio: Blob<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolResponse<'a> {
    function_responses: &'a [FunctionResponse],
}

/// Model ids must carry the `models/` resource prefix on the wire.
pub fn qualified_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

pub fn encode_setup(setup: &SessionSetup) -> serde_json::Result<String> {
    let tools = if setup.tools.is_empty() {
        Vec::new()
    } else {
        vec![Tool {
            function_declarations: &setup.tools,
        }]
    };

    serde_json::to_string(&ClientMessage::Setup(Setup {
        model: qualified_model(&setup.model),
        generation_config: GenerationConfig {
            response_modalities: ["AUDIO"],
            speech_config: SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig {
                        voice_name: &setup.voice,
                    },
                },
            },
        },
        system_instruction: SystemInstruction {
            parts: [TextPart {
                text: &setup.system_prompt,
            }],
        },
        tools,
        output_audio_transcription: EmptyConfig {},
    }))
}

/// Encode a command as a text frame. `Close` has no JSON form and yields `None`.
pub fn encode_command(command: &UpstreamCommand) -> serde_json::Result<Option<String>> {
    let message = match command {
        UpstreamCommand::RealtimeAudio { data, mime_type } => ClientMessage::RealtimeInput(RealtimeInput {
            audio: Blob { mime_type, data },
        }),
        UpstreamCommand::ToolResponse(responses) => ClientMessage::ToolResponse(ToolResponse {
            function_responses: responses,
        }),
        UpstreamCommand::Close => return Ok(None),
    };
    serde_json::to_string(&message).map(Some)
}

/// One message from the server. Several sections may be present at once.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub setup_complete: Option<Value>,
    pub server_content: Option<ServerContent>,
    pub tool_call: Option<ToolCallMessage>,
    pub go_away: Option<GoAway>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    pub model_turn: Option<ModelTurn>,
    pub output_transcription: Option<Transcription>,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default)]
    pub interrupted: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub text: Option<String>,
    pub inline_data: Option<InlineData>,
    /// Internal reasoning parts are never shown to users
    #[serde(default)]
    pub thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Transcription {
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallMessage {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    pub time_left: Option<String>,
}

pub fn decode_server_message(text: &str) -> serde_json::Result<ServerMessage> {
    serde_json::from_str(text)
}

/// Turns server messages into `UpstreamEvent`s.
///
/// Transcription arrives in small fragments; they are collected and released
/// as one `Text` event when the model's turn ends or is interrupted.
#[derive(Debug, Default)]
pub struct EventTranslator {
    transcript: String,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(&mut self, message: ServerMessage) -> Vec<UpstreamEvent> {
        let mut events = Vec::new();

        if let Some(content) = message.server_content {
            for part in content.model_turn.map(|turn| turn.parts).unwrap_or_default() {
                if let Some(inline) = part.inline_data {
                    if inline.mime_type.starts_with("audio/") {
                        events.push(UpstreamEvent::Audio {
                            data: inline.data,
                            mime_type: inline.mime_type,
                        });
                    }
                }
                match part.text {
                    Some(text) if !part.thought && !text.trim().is_empty() => {
                        events.push(UpstreamEvent::Text(text));
                    }
                    _ => {}
                }
            }

            if let Some(fragment) = content.output_transcription.and_then(|t| t.text) {
                self.transcript.push_str(&fragment);
            }

            if content.turn_complete || content.interrupted {
                if let Some(text) = self.take_transcript() {
                    events.push(UpstreamEvent::Text(text));
                }
            }
        }

        if let Some(tool_call) = message.tool_call {
            if !tool_call.function_calls.is_empty() {
                events.push(UpstreamEvent::ToolCall(tool_call.function_calls));
            }
        }

        events
    }

    fn take_transcript(&mut self) -> Option<String> {
        let text = std::mem::take(&mut self.transcript);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}
