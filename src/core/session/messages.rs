//! Wire messages exchanged with voice clients
//!
//! Control frames are JSON text; audio travels as binary frames.
//!
//! ## Client → Server
//! - `{"event": "audioEnd"}`: finalize the buffered utterance now
//! - Binary frames: raw recorded audio chunks (codec opaque to the server)
//!
//! ## Server → Client
//! - `{"event": "audioEnd"}`: end of one synthesized audio reply
//! - `{"event": "noSpeechDetected"}`: the last utterance produced no transcript
//! - `{"type": "error", "source": ..., "message": ...}`
//! - `{"type": "textResponse", "text": ..., "error"?: ...}`
//! - `{"type": "directResponse", "text": ...}`
//! - Binary frames: one complete synthesized-audio payload per reply

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum allowed size for a control frame (4 KB)
pub const MAX_CONTROL_MESSAGE_SIZE: usize = 4 * 1024;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Control messages sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "event")]
pub enum IncomingMessage {
    /// Client finished speaking; finalize whatever is buffered
    #[serde(rename = "audioEnd")]
    AudioEnd,
}

/// Malformed or oversized control frame from a client
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Control message too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("Invalid control message: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl IncomingMessage {
    /// Parse a text frame into a control message
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        if text.len() > MAX_CONTROL_MESSAGE_SIZE {
            return Err(ProtocolError::TooLarge {
                size: text.len(),
                max: MAX_CONTROL_MESSAGE_SIZE,
            });
        }
        Ok(serde_json::from_str(text)?)
    }
}

// =============================================================================
// Outgoing Messages (Server -> Client)
// =============================================================================

/// Component that produced an error frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorSource {
    /// Synthesis of an automation reply failed before audio started
    #[serde(rename = "tts")]
    Tts,
    /// Audio stream of an automation reply broke mid-transfer
    #[serde(rename = "tts-stream")]
    TtsStream,
    /// Audio stream of a fallback reply broke mid-transfer
    #[serde(rename = "tts-direct-stream")]
    TtsDirectStream,
    /// Transcription failed
    #[serde(rename = "stt")]
    Stt,
    /// Fallback reply could not be synthesized
    #[serde(rename = "direct")]
    Direct,
}

/// Events carried under the `event` key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ServerEvent {
    AudioEnd,
    NoSpeechDetected,
}

/// Typed frames carried under the `type` key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TypedMessage {
    Error {
        source: ErrorSource,
        message: String,
    },
    TextResponse {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    DirectResponse {
        text: String,
    },
}

/// Outgoing JSON control frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutgoingMessage {
    Event { event: ServerEvent },
    Typed(TypedMessage),
}

impl OutgoingMessage {
    pub fn audio_end() -> Self {
        Self::Event {
            event: ServerEvent::AudioEnd,
        }
    }

    pub fn no_speech_detected() -> Self {
        Self::Event {
            event: ServerEvent::NoSpeechDetected,
        }
    }

    pub fn error(source: ErrorSource, message: impl Into<String>) -> Self {
        Self::Typed(TypedMessage::Error {
            source,
            message: message.into(),
        })
    }

    pub fn text_response(text: impl Into<String>, error: Option<String>) -> Self {
        Self::Typed(TypedMessage::TextResponse {
            text: text.into(),
            error,
        })
    }

    pub fn direct_response(text: impl Into<String>) -> Self {
        Self::Typed(TypedMessage::DirectResponse { text: text.into() })
    }
}

// =============================================================================
// Message Routing
// =============================================================================

/// Frames queued for the per-connection sender task
#[derive(Debug, Clone)]
pub enum MessageRoute {
    /// JSON text message
    Outgoing(OutgoingMessage),
    /// Binary audio data
    Audio(Bytes),
}
