//! Connection gateway
//!
//! Upgrades a client connection, registers it as a session and runs the
//! session loop until the client goes away.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::session::{UtteranceCallback, drive_session};
use crate::core::session::{MessageRoute, SessionHandle, Utterance, UtteranceBuffer};
use crate::state::AppState;

/// Outbound frames queued per connection
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Voice WebSocket handler
///
/// Clients stream recorded audio as binary frames and receive synthesized
/// replies on the same connection.
pub async fn ws_voice_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    debug!("Voice WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_voice_socket(socket, state))
}

async fn handle_voice_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let session_id = Uuid::new_v4().to_string();
    info!(session_id = %session_id, "Client connected");

    let (mut sender, receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<MessageRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages; when it exits the session reads as closed
    let sender_session_id = session_id.clone();
    let sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let result = match route {
                MessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!(session_id = %sender_session_id, "Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                MessageRoute::Audio(data) => sender.send(Message::Binary(data)).await,
            };

            if let Err(e) = result {
                error!(session_id = %sender_session_id, "Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let pipeline = app_state.pipeline.clone();
    pipeline
        .sessions()
        .register(SessionHandle::new(session_id.clone(), message_tx));

    let on_utterance: UtteranceCallback = {
        let pipeline = pipeline.clone();
        Arc::new(move |session_id: String, utterance: Utterance| {
            let pipeline = pipeline.clone();
            Box::pin(async move {
                pipeline.process_utterance(&session_id, utterance).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        })
    };

    let mut buffer = UtteranceBuffer::new(app_state.config.timeouts.utterance_idle);
    let end = drive_session(&session_id, receiver, &mut buffer, &on_utterance).await;

    // Teardown
    buffer.reset();
    pipeline.teardown_session(&session_id).await;
    sender_task.abort();

    info!(session_id = %session_id, reason = ?end, "Client disconnected");
}
