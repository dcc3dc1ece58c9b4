//! Per-connection session loop
//!
//! One task per connection owns the utterance buffer and its idle deadline,
//! so buffer updates for a session never race. Finalized utterances are
//! handed to the pipeline on their own task and the loop keeps reading.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::ws::Message;
use futures::{Stream, StreamExt};
use tokio::select;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

use crate::core::session::{IncomingMessage, PushOutcome, Utterance, UtteranceBuffer};

/// Invoked with each finalized utterance; the returned future is spawned
pub type UtteranceCallback =
    Arc<dyn Fn(String, Utterance) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Why the session loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client sent a close frame
    ClientClosed,
    /// Inbound stream ended without a close frame
    StreamEnded,
    /// Transport error on the inbound stream
    TransportError,
}

/// What triggered a finalization
#[derive(Debug, Clone, Copy)]
enum FinalizeTrigger {
    AudioEnd,
    IdleTimeout,
}

/// Read frames until the client goes away
///
/// Binary frames feed the buffer. `{event: "audioEnd"}` or the idle deadline
/// finalize it. Malformed control frames are logged and ignored.
pub async fn drive_session<S>(
    session_id: &str,
    mut inbound: S,
    buffer: &mut UtteranceBuffer,
    on_utterance: &UtteranceCallback,
) -> SessionEnd
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let deadline = buffer.deadline();

        select! {
            frame = inbound.next() => match frame {
                Some(Ok(Message::Binary(data))) => {
                    let len = data.len();
                    match buffer.push(data, Instant::now()) {
                        PushOutcome::Buffered => {
                            trace!(session_id = %session_id, bytes = len, "Audio chunk buffered");
                        }
                        PushOutcome::Dropped => {
                            debug!(
                                session_id = %session_id,
                                bytes = len,
                                "Audio chunk dropped while previous utterance is processing"
                            );
                        }
                    }
                }
                Some(Ok(Message::Text(text))) => match IncomingMessage::parse(text.as_str()) {
                    Ok(IncomingMessage::AudioEnd) => {
                        finalize(session_id, buffer, on_utterance, FinalizeTrigger::AudioEnd);
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, "Ignoring control message: {}", e);
                    }
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) => {
                    info!(session_id = %session_id, "Client closed connection");
                    return SessionEnd::ClientClosed;
                }
                Some(Err(e)) => {
                    warn!(session_id = %session_id, "WebSocket error: {}", e);
                    return SessionEnd::TransportError;
                }
                None => {
                    info!(session_id = %session_id, "WebSocket stream ended");
                    return SessionEnd::StreamEnded;
                }
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                finalize(session_id, buffer, on_utterance, FinalizeTrigger::IdleTimeout);
            }
        }
    }
}

fn finalize(
    session_id: &str,
    buffer: &mut UtteranceBuffer,
    on_utterance: &UtteranceCallback,
    trigger: FinalizeTrigger,
) {
    match buffer.finalize() {
        Some(utterance) => {
            info!(
                session_id = %session_id,
                bytes = utterance.audio().len(),
                trigger = ?trigger,
                "Utterance finalized"
            );
            tokio::spawn(on_utterance(session_id.to_string(), utterance));
        }
        None => {
            debug!(session_id = %session_id, trigger = ?trigger, "Nothing to finalize");
        }
    }
}
