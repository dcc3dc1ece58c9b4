//! Voice WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::ws::ws_voice_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the voice WebSocket router
///
/// Clients connect to the server root (`ws://host:3000`); `/ws` is accepted too.
///
/// # Protocol
///
/// Clients send binary audio frames and `{"event": "audioEnd"}` when they
/// stop speaking. The server answers with one binary audio frame per reply
/// followed by `{"event": "audioEnd"}`, or with `directResponse`,
/// `textResponse`, `error` and `noSpeechDetected` frames.
pub fn create_ws_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(ws_voice_handler))
        .route("/ws", get(ws_voice_handler))
        .layer(TraceLayer::new_for_http())
}
