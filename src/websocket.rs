//! # Relay WebSocket Handler
//!
//! One `RelaySocket` actor per client connection on `/ws`. Each actor is
//! paired with exactly one upstream conversational session for its whole
//! life.
//!
//! ## Lifecycle:
//! 1. **Accept**: subscribe to the trip hub (the current trip list arrives
//!    right away), start the heartbeat, open the upstream session. Client
//!    frames wait until the upstream connect settles.
//! 2. **Relay**: client `audio` frames go upstream unchanged; upstream audio,
//!    text and tool calls come back as envelopes or trip appends.
//! 3. **Close**: unsubscribe and close the upstream session. Whoever closes
//!    first (client, heartbeat timeout, setup failure) ends both sides.
//!
//! ## Message Format:
//! - **Client → Server**: `{type:"audio", data}` and `{type:"start"}`
//! - **Server → Client**: `status`, `log`, `trips_update` and `audio` envelopes
//!
//! ## Actor Model:
//! The actor consumes two streams: the client's WebSocket frames and the
//! upstream session's events (`UpstreamEvent`). Both are plain
//! `StreamHandler`s on the same actor, so the handlers never run
//! concurrently and need no locking.

use crate::audio::codec::INPUT_MIME_TYPE;
use crate::prompt::{self, SAVE_TRIP_TOOL};
use crate::protocol::{ClientEnvelope, EnvelopeError, ServerEnvelope};
use crate::state::AppState;
use crate::trips::hub::{AppendTrip, Subscribe, TripsBroadcast, Unsubscribe};
use crate::trips::record::TripRecord;
use crate::upstream::{FunctionCall, FunctionResponse, UpstreamEvent, UpstreamHandle, UpstreamSession};

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub struct RelaySocket {
    /// Connection id, used for hub subscription and in every log line
    id: Uuid,

    state: AppState,

    /// `None` until upstream setup completes, and again after it closes
    upstream: Option<UpstreamHandle>,

    /// Last time the client showed any sign of life
    last_heartbeat: Instant,

    heartbeat_interval: Duration,
    client_timeout: Duration,
}

impl RelaySocket {
    pub fn new(state: AppState) -> Self {
        let server = &state.get_config().server;
        let heartbeat_interval = Duration::from_secs(server.heartbeat_interval_secs);
        let client_timeout = Duration::from_secs(server.client_timeout_secs);
        Self {
            id: Uuid::new_v4(),
            state,
            upstream: None,
            last_heartbeat: Instant::now(),
            heartbeat_interval,
            client_timeout,
        }
    }

    fn send_envelope(&self, ctx: &mut ws::WebsocketContext<Self>, envelope: ServerEnvelope) {
        match envelope.to_json() {
            Ok(json) => ctx.text(json),
            Err(err) => error!(session = %self.id, error = %err, "Failed to serialize envelope"),
        }
    }

    /// Ping the client periodically and drop it once it stops answering.
    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(self.heartbeat_interval, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > act.client_timeout {
                warn!(session = %act.id, "Client heartbeat timed out, closing connection");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    /// Connect upstream. `ctx.wait` holds back client frames until this
    /// settles, so no audio is relayed before the session exists.
    fn open_upstream(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let setup = prompt::session_setup(self.state.get_config());
        let connecting = self.state.connector.connect(setup);

        ctx.wait(connecting.into_actor(self).map(|result, act, ctx| match result {
            Ok(session) => act.attach_upstream(session, ctx),
            Err(err) => {
                error!(session = %act.id, "Upstream setup failed, closing client: {:#}", err);
                ctx.close(Some(ws::CloseReason {
                    code: ws::CloseCode::Error,
                    description: Some("upstream session unavailable".to_string()),
                }));
                ctx.stop();
            }
        }));
    }

    fn attach_upstream(&mut self, session: UpstreamSession, ctx: &mut ws::WebsocketContext<Self>) {
        let UpstreamSession { handle, events } = session;
        self.upstream = Some(handle);
        ctx.add_stream(UnboundedReceiverStream::new(events));
        debug!(session = %self.id, "Upstream session attached");
    }

    fn handle_client_text(&mut self, text: &str) {
        match ClientEnvelope::parse(text) {
            Ok(ClientEnvelope::Audio { data }) => self.forward_audio(data),
            Ok(ClientEnvelope::Start) => {
                debug!(session = %self.id, "Client acknowledged session start");
            }
            Err(EnvelopeError::Unhandled(kind)) => {
                warn!(session = %self.id, kind = %kind, "Unhandled envelope");
            }
            Err(err) => {
                warn!(session = %self.id, error = %err, "Ignoring invalid client message");
            }
        }
    }

    fn forward_audio(&self, data: String) {
        let Some(upstream) = &self.upstream else {
            debug!(session = %self.id, "Dropping audio frame, no upstream session");
            return;
        };
        if let Err(err) = upstream.send_realtime_input(data, INPUT_MIME_TYPE) {
            warn!(session = %self.id, error = %err, "Failed to forward audio frame");
        }
    }

    fn handle_tool_call(&mut self, call: FunctionCall, ctx: &mut ws::WebsocketContext<Self>) {
        if call.name != SAVE_TRIP_TOOL {
            warn!(session = %self.id, tool = %call.name, "Ignoring call to unknown tool");
            return;
        }

        match TripRecord::from_tool_args(&call.args, &self.state.get_config().catalog) {
            Ok(record) => {
                let appending = self.state.trips.send(AppendTrip(record));
                ctx.spawn(appending.into_actor(self).map(move |result, act, ctx| match result {
                    Ok(trip_count) => {
                        act.state.record_trip_accepted();
                        act.respond_to_tool(&call, json!({"result": "ok", "tripCount": trip_count}));
                    }
                    Err(err) => {
                        error!(session = %act.id, error = %err, "Trip hub unavailable");
                        act.respond_to_tool(&call, json!({"error": "trip store unavailable"}));
                        act.send_envelope(ctx, ServerEnvelope::log("Trip not saved: trip store unavailable"));
                    }
                }));
            }
            Err(rejection) => {
                warn!(
                    session = %self.id,
                    call_id = ?call.id,
                    reason = %rejection,
                    "Rejected saveTrip call"
                );
                self.state.record_trip_rejected();
                self.respond_to_tool(&call, json!({"error": rejection.to_string()}));
                self.send_envelope(ctx, ServerEnvelope::log(format!("Trip not saved: {}", rejection)));
            }
        }
    }

    fn respond_to_tool(&self, call: &FunctionCall, response: Value) {
        let Some(upstream) = &self.upstream else {
            warn!(session = %self.id, tool = %call.name, "Upstream gone before tool response");
            return;
        };
        if let Err(err) = upstream.send_tool_response(vec![FunctionResponse::for_call(call, response)]) {
            warn!(session = %self.id, error = %err, "Failed to send tool response");
        }
    }
}

impl Actor for RelaySocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(session = %self.id, "Client connected");
        self.state.session_opened();
        self.start_heartbeat(ctx);

        self.state.trips.do_send(Subscribe {
            id: self.id,
            recipient: ctx.address().recipient(),
        });

        self.open_upstream(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.state.trips.do_send(Unsubscribe { id: self.id });
        self.state.session_closed();

        if let Some(upstream) = self.upstream.take() {
            if let Err(err) = upstream.close() {
                warn!(session = %self.id, error = %err, "Failed to close upstream session");
            }
        }

        info!(session = %self.id, "Client disconnected");
    }
}

/// Frames from the client.
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RelaySocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        let msg = match msg {
            Ok(msg) => msg,
            Err(err) => {
                error!(session = %self.id, error = %err, "WebSocket protocol error");
                ctx.stop();
                return;
            }
        };

        self.last_heartbeat = Instant::now();

        match msg {
            ws::Message::Text(text) => self.handle_client_text(&text),
            ws::Message::Binary(bytes) => {
                warn!(session = %self.id, len = bytes.len(), "Ignoring binary frame");
            }
            ws::Message::Ping(payload) => ctx.pong(&payload),
            ws::Message::Pong(_) => {}
            ws::Message::Close(reason) => {
                info!(session = %self.id, reason = ?reason, "Client closed the socket");
                ctx.close(reason);
                ctx.stop();
            }
            ws::Message::Continuation(_) => {
                warn!(session = %self.id, "Ignoring continuation frame");
            }
            ws::Message::Nop => {}
        }
    }
}

/// Events from the upstream session.
impl StreamHandler<UpstreamEvent> for RelaySocket {
    fn handle(&mut self, event: UpstreamEvent, ctx: &mut Self::Context) {
        match event {
            UpstreamEvent::Opened => {
                info!(session = %self.id, "Upstream session ready");
                self.send_envelope(ctx, ServerEnvelope::status("Connected. Start speaking."));
            }
            UpstreamEvent::Audio { data, .. } => {
                self.send_envelope(ctx, ServerEnvelope::Audio { data });
            }
            UpstreamEvent::Text(text) => {
                self.send_envelope(ctx, ServerEnvelope::log(text));
            }
            UpstreamEvent::ToolCall(calls) => {
                for call in calls {
                    self.handle_tool_call(call, ctx);
                }
            }
            UpstreamEvent::Errored(message) => {
                error!(session = %self.id, error = %message, "Upstream error");
                self.send_envelope(ctx, ServerEnvelope::log(format!("Upstream error: {}", message)));
            }
            UpstreamEvent::Closed { reason } => {
                info!(session = %self.id, reason = %reason, "Upstream session closed");
                self.upstream = None;
                self.send_envelope(ctx, ServerEnvelope::status(format!("Session closed: {}", reason)));
            }
        }
    }

    /// The client socket outlives the upstream event stream.
    fn finished(&mut self, _ctx: &mut Self::Context) {
        debug!(session = %self.id, "Upstream event stream ended");
    }
}

/// Trip list updates from the hub, already serialized.
impl Handler<TripsBroadcast> for RelaySocket {
    type Result = ();

    fn handle(&mut self, msg: TripsBroadcast, ctx: &mut Self::Context) {
        ctx.text(&*msg.0);
    }
}

/// WebSocket endpoint handler for `GET /ws`.
pub async fn relay_websocket(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let peer = req.connection_info().peer_addr().map(str::to_string);
    debug!(peer = ?peer, "New WebSocket connection request");

    ws::start(RelaySocket::new(state.get_ref().clone()), &req, stream)
}
