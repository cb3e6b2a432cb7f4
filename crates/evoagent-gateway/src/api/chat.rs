//! `POST /api/chat/send` (non-streaming fallback) and `WS /ws/chat`
//! (streaming turn) — spec §6. The WebSocket transport pattern is
//! grounded on `gateway/src/nodes/ws.rs`'s split-socket +
//! upgrade/handle_socket shape.

use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use evoagent_engine::{EngineEvent, EventSink, SinkError, TurnInput, TurnOutcome, VecSink};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct SendRequest {
    thread_id: Option<Uuid>,
    message: String,
    #[serde(default = "default_provider")]
    provider: String,
}

fn default_provider() -> String {
    "mock".to_string()
}

#[derive(Serialize)]
pub struct SendResponse {
    thread_id: Uuid,
    run_id: Uuid,
    text: String,
    iterations: u32,
    events: Vec<EngineEvent>,
}

/// `POST /api/chat/send {thread_id?, message, provider}` — runs one turn
/// to completion and returns the final text plus every event the turn
/// emitted along the way (spec §6).
pub async fn send(State(state): State<AppState>, Json(req): Json<SendRequest>) -> Response {
    let thread_id = req.thread_id.unwrap_or_else(Uuid::new_v4);
    state.store.ensure_thread(thread_id);

    let run_id = Uuid::new_v4();
    let sink = VecSink::new();
    let input = TurnInput {
        thread_id,
        run_id,
        provider_id: req.provider,
        user_message: req.message,
        cancel: CancellationToken::new(),
    };

    match state.engine.run_turn(input, &sink).await {
        Ok(TurnOutcome { text, iterations }) => Json(SendResponse {
            thread_id,
            run_id,
            text,
            iterations,
            events: sink.into_events(),
        })
        .into_response(),
        Err(e) => super::api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Deserialize)]
pub struct WsQuery {
    thread_id: Option<Uuid>,
    #[serde(default = "default_provider")]
    provider: String,
}

/// `WS /ws/chat?thread_id=&provider=` — upgrades, then for each inbound
/// `{type:"user_message"|"main_agent_chat", content}` runs a turn and
/// streams its [`EngineEvent`]s back as they're emitted. `{type:"ping"}`
/// gets an immediate pong; anything else yields `main_agent_error`.
pub async fn ws_chat(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query))
}

#[derive(Deserialize)]
struct InboundMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: String,
}

/// Forwards [`EngineEvent`]s from a running turn to the client over an
/// mpsc channel — `EventSink::emit` is synchronous, so this just hands
/// events to the channel for the writer task to serialize.
struct ChannelSink(mpsc::UnboundedSender<EngineEvent>);

impl EventSink for ChannelSink {
    fn emit(&self, event: EngineEvent) -> Result<(), SinkError> {
        self.0.send(event).map_err(|_| SinkError::Disconnected)
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, query: WsQuery) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let thread_id = query.thread_id.unwrap_or_else(Uuid::new_v4);
    state.store.ensure_thread(thread_id);
    let cancel = CancellationToken::new();

    while let Some(Ok(msg)) = ws_stream.next().await {
        let text = match msg {
            WsMessage::Text(t) => t,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let inbound: InboundMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                let _ = send_json(
                    &mut ws_sink,
                    &serde_json::json!({"type": "main_agent_error", "message": format!("malformed message: {e}")}),
                )
                .await;
                continue;
            }
        };

        match inbound.kind.as_str() {
            "ping" => {
                let _ = send_json(&mut ws_sink, &serde_json::json!({"type": "pong"})).await;
            }
            "user_message" | "main_agent_chat" => {
                let run_id = Uuid::new_v4();
                let (tx, mut rx) = mpsc::unbounded_channel::<EngineEvent>();
                let sink = ChannelSink(tx);
                let engine = state.engine.clone();
                let input = TurnInput {
                    thread_id,
                    run_id,
                    provider_id: query.provider.clone(),
                    user_message: inbound.content,
                    cancel: cancel.clone(),
                };

                // Drive the turn on a side task so we can forward events
                // to the socket as they arrive rather than buffering the
                // whole turn before writing anything.
                let turn_handle = tokio::spawn(async move { engine.run_turn(input, &sink).await });

                while let Some(event) = rx.recv().await {
                    if send_json(&mut ws_sink, &event).await.is_err() {
                        break;
                    }
                }

                if let Ok(Err(e)) = turn_handle.await {
                    let _ = send_json(
                        &mut ws_sink,
                        &serde_json::json!({"type": "main_agent_error", "message": e.to_string()}),
                    )
                    .await;
                }
            }
            other => {
                let _ = send_json(
                    &mut ws_sink,
                    &serde_json::json!({"type": "main_agent_error", "message": format!("unknown message type: {other}")}),
                )
                .await;
            }
        }
    }

    cancel.cancel();
}

async fn send_json<T: Serialize>(
    sink: &mut (impl SinkExt<WsMessage> + Unpin),
    value: &T,
) -> Result<(), ()> {
    let payload = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    sink.send(WsMessage::Text(payload)).await.map_err(|_| ())
}
