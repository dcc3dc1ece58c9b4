//! Speech synthesis streamer
//!
//! Requests speech for a piece of text and relays the result to a session.
//! The response content type decides the branch: `audio/*` bodies are
//! streamed in, buffered and sent as one binary frame followed by
//! `{event: "audioEnd"}`; anything else is treated as a diagnostic.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::core::session::{ErrorSource, OutgoingMessage, SessionHandle};
use crate::core::upstream::describe_error_body;

/// Annotation attached to a text reply when no audio could be produced
pub const NON_AUDIO_REPLY_ERROR: &str = "TTS returned non-audio content";

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("TTS service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("TTS request timed out")]
    Timeout,

    #[error("TTS request failed: {0}")]
    Network(String),

    /// The audio stream broke after it had started
    #[error("Audio stream error: {0}")]
    Stream(String),
}

impl From<reqwest::Error> for SynthesisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
}

/// Which delivery path a synthesized reply belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Reply delivered by the automation through the intake endpoint
    Automation,
    /// Locally generated fallback after a relay failure
    Fallback,
}

impl ReplyKind {
    fn stream_error_source(self) -> ErrorSource {
        match self {
            Self::Automation => ErrorSource::TtsStream,
            Self::Fallback => ErrorSource::TtsDirectStream,
        }
    }

    fn stream_error_message(self, err: SynthesisError) -> String {
        let detail = match err {
            SynthesisError::Stream(detail) => detail,
            other => other.to_string(),
        };
        match self {
            Self::Automation => format!("Audio stream error: {detail}"),
            Self::Fallback => format!("Direct audio stream error: {detail}"),
        }
    }
}

/// Body of a synthesized reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesizedSpeech {
    Audio(Bytes),
    /// Non-audio body, kept for diagnostics
    NonAudio {
        content_type: Option<String>,
        body: String,
    },
}

/// A TTS response whose headers have arrived but whose body has not been read
#[derive(Debug)]
pub struct PendingSpeech {
    content_type: Option<String>,
    response: reqwest::Response,
}

impl PendingSpeech {
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn is_audio(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("audio/"))
    }

    /// Read the whole body
    ///
    /// Audio bodies are accumulated chunk by chunk; a broken stream yields
    /// [`SynthesisError::Stream`].
    pub async fn collect(self) -> Result<SynthesizedSpeech, SynthesisError> {
        if !self.is_audio() {
            let body = self
                .response
                .text()
                .await
                .map_err(|e| SynthesisError::Stream(e.to_string()))?;
            return Ok(SynthesizedSpeech::NonAudio {
                content_type: self.content_type,
                body,
            });
        }

        let mut stream = self.response.bytes_stream();
        let mut audio = BytesMut::new();
        let mut chunks = 0usize;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SynthesisError::Stream(e.to_string()))?;
            chunks += 1;
            audio.extend_from_slice(&chunk);
        }

        debug!("Collected {} bytes of synthesized audio in {} chunks", audio.len(), chunks);
        Ok(SynthesizedSpeech::Audio(audio.freeze()))
    }
}

#[derive(Debug, Clone)]
pub struct SpeechSynthesizer {
    http: Client,
    endpoint: String,
}

impl SpeechSynthesizer {
    pub fn new(http: Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Start synthesis and wait for the response head
    ///
    /// Unreachable service, non-2xx status and timeouts fail here, before
    /// any audio reaches the client. The timeout also bounds reading the body.
    pub async fn request(
        &self,
        text: &str,
        timeout: Duration,
    ) -> Result<PendingSpeech, SynthesisError> {
        let response = self
            .http
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&SynthesisRequest { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthesisError::Upstream {
                status: status.as_u16(),
                message: describe_error_body(&body),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(PendingSpeech {
            content_type,
            response,
        })
    }
}

/// Deliver a started synthesis to the session
///
/// Audio goes out as a single binary frame followed by `audioEnd`; an empty
/// audio body sends nothing. Stream failures become an error frame scoped to
/// `kind`. Non-audio replies fall back to the text for automation replies and
/// are only logged for fallback replies, whose text was already sent.
pub async fn relay_speech(
    session: &SessionHandle,
    pending: PendingSpeech,
    text: &str,
    kind: ReplyKind,
) {
    let session_id = session.id();

    match pending.collect().await {
        Ok(SynthesizedSpeech::Audio(audio)) => {
            if audio.is_empty() {
                warn!(session_id = %session_id, "TTS stream ended without audio");
                return;
            }

            let bytes = audio.len();
            let delivered = match session.send_audio(audio).await {
                Ok(()) => session.send(OutgoingMessage::audio_end()).await,
                Err(e) => Err(e),
            };
            match delivered {
                Ok(()) => info!(session_id = %session_id, bytes, "Synthesized audio delivered"),
                Err(e) => debug!(session_id = %session_id, "Dropping synthesized audio: {}", e),
            }
        }
        Ok(SynthesizedSpeech::NonAudio { content_type, body }) => {
            warn!(
                session_id = %session_id,
                content_type = content_type.as_deref().unwrap_or("none"),
                "TTS returned non-audio content: {}",
                describe_error_body(&body)
            );
            if kind == ReplyKind::Automation {
                let message = OutgoingMessage::text_response(
                    text,
                    Some(NON_AUDIO_REPLY_ERROR.to_string()),
                );
                if let Err(e) = session.send(message).await {
                    debug!(session_id = %session_id, "Dropping text reply: {}", e);
                }
            }
        }
        Err(e) => {
            error!(session_id = %session_id, "TTS stream failed: {}", e);
            let message =
                OutgoingMessage::error(kind.stream_error_source(), kind.stream_error_message(e));
            if let Err(e) = session.send(message).await {
                debug!(session_id = %session_id, "Dropping stream error frame: {}", e);
            }
        }
    }
}
