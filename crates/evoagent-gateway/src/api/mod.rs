//! axum `Router` assembly (spec §6), one module per resource — grounded
//! on `gateway/src/api/*.rs`'s "merge sub-routers" pattern.

pub mod chat;
pub mod threads;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/api/threads", post(threads::create_thread))
        .route("/api/threads/:id/events", get(threads::get_events))
        .route("/api/threads/:id/messages", get(threads::get_messages))
        .route("/api/chat/send", post(chat::send))
        .route("/ws/chat", get(chat::ws_chat))
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let headers = [header::CONTENT_TYPE, header::AUTHORIZATION];

    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(headers);
    }

    let exact: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| o.parse::<HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(exact))
        .allow_methods(methods)
        .allow_headers(headers)
}

/// A standardized JSON error body: `{"error": "<message>"}`.
pub(crate) fn api_error(
    status: axum::http::StatusCode,
    message: impl Into<String>,
) -> axum::response::Response {
    use axum::response::IntoResponse;
    (status, axum::Json(serde_json::json!({ "error": message.into() }))).into_response()
}
