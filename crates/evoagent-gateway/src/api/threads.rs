//! `POST /api/threads`, `GET /api/threads/{id}/events`,
//! `GET /api/threads/{id}/messages` (spec §6).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use evoagent_providers::LlmProvider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Serialize)]
pub struct CreateThreadResponse {
    thread_id: Uuid,
}

/// `POST /api/threads` → `{thread_id}`.
pub async fn create_thread(State(state): State<AppState>) -> Response {
    let thread_id = Uuid::new_v4();
    match state.store.create_thread(thread_id) {
        Ok(()) => Json(CreateThreadResponse { thread_id }).into_response(),
        Err(e) => super::api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// `GET /api/threads/{id}/events` → ordered events.
pub async fn get_events(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    Json(state.store.get_canonical_events(id)).into_response()
}

#[derive(Deserialize)]
pub struct MessagesQuery {
    /// Provider adapter whose content-block replay rules to apply
    /// (spec §4.D); defaults to the always-available mock provider.
    #[serde(default = "default_provider")]
    provider: String,
}

fn default_provider() -> String {
    "mock".to_string()
}

/// `GET /api/threads/{id}/messages` → derived messages.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
) -> Response {
    let requires_signed_tool_replay = state
        .providers
        .get(&query.provider)
        .map(|p| p.capabilities().requires_signed_tool_replay)
        .unwrap_or(false);
    let messages = evoagent_events::build_messages(
        &state.store,
        id,
        &query.provider,
        requires_signed_tool_replay,
    );
    Json(messages).into_response()
}
