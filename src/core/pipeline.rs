//! Utterance pipeline
//!
//! Owns the outbound service clients and the session registry, and runs the
//! fixed chain for one utterance: transcription, relay to the automation and,
//! when the relay fails, a spoken apology. Replies that come back through the
//! intake endpoint are synthesized here as well.
//!
//! Every step resolves the session through the registry right before sending,
//! so a client that disconnected mid-flight simply receives nothing.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::core::automation::{AutomationRelay, RelayOutcome, SkipReason};
use crate::core::session::{ErrorSource, OutgoingMessage, SessionRegistry, Utterance};
use crate::core::stt::TranscriptionClient;
use crate::core::tts::{ReplyKind, SpeechSynthesizer, SynthesisError, relay_speech};

/// What happened to a reply handed over by the automation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyDispatch {
    /// No open session with that id
    Disconnected,
    /// Synthesis started; audio is being relayed in the background
    Streaming,
}

pub struct VoicePipeline {
    sessions: Arc<SessionRegistry>,
    transcriber: TranscriptionClient,
    automation: AutomationRelay,
    synthesizer: SpeechSynthesizer,
    tts_reply_timeout: Duration,
    tts_fallback_timeout: Duration,
}

impl VoicePipeline {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        transcriber: TranscriptionClient,
        automation: AutomationRelay,
        synthesizer: SpeechSynthesizer,
        tts_reply_timeout: Duration,
        tts_fallback_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            transcriber,
            automation,
            synthesizer,
            tts_reply_timeout,
            tts_fallback_timeout,
        }
    }

    /// Build the pipeline and its HTTP client from configuration
    ///
    /// All three services share one connection pool.
    pub fn from_config(
        config: &ServerConfig,
        sessions: Arc<SessionRegistry>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .danger_accept_invalid_certs(config.allow_insecure_tls)
            .build()?;

        if config.allow_insecure_tls {
            warn!("Outbound TLS certificate verification is disabled");
        }

        Ok(Self::new(
            sessions,
            TranscriptionClient::new(
                http.clone(),
                config.stt_url.clone(),
                config.audio_temp_dir.clone(),
                config.timeouts.stt,
            ),
            AutomationRelay::new(
                http.clone(),
                config.automation_webhook_url.clone(),
                config.timeouts.automation,
            ),
            SpeechSynthesizer::new(http, config.tts_url.clone()),
            config.timeouts.tts_reply,
            config.timeouts.tts_fallback,
        ))
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Run one finalized utterance through the chain
    ///
    /// The session accepts new audio again once this returns and the
    /// utterance is dropped.
    pub async fn process_utterance(&self, session_id: &str, utterance: Utterance) {
        info!(session_id = %session_id, bytes = utterance.audio().len(), "Processing utterance");

        let transcript = match self
            .transcriber
            .transcribe(session_id, utterance.audio())
            .await
        {
            Ok(Some(text)) => text,
            Ok(None) => {
                info!(session_id = %session_id, "No speech detected");
                self.notify(session_id, OutgoingMessage::no_speech_detected())
                    .await;
                return;
            }
            Err(e) => {
                error!(session_id = %session_id, "STT processing failed: {}", e);
                self.notify(
                    session_id,
                    OutgoingMessage::error(ErrorSource::Stt, format!("STT processing failed: {e}")),
                )
                .await;
                return;
            }
        };

        info!(session_id = %session_id, transcript = %transcript, "Transcription received");

        match self.automation.forward(session_id, &transcript).await {
            Ok(RelayOutcome::Delivered) => {
                debug!(session_id = %session_id, "Awaiting automation reply");
            }
            Ok(RelayOutcome::Skipped(SkipReason::NotConfigured)) => {
                warn!(
                    session_id = %session_id,
                    "Automation webhook URL not configured, transcript not relayed"
                );
            }
            Ok(RelayOutcome::Skipped(SkipReason::EmptyTranscript)) => {
                debug!(session_id = %session_id, "Empty transcript not relayed");
            }
            Err(e) => {
                warn!(session_id = %session_id, "Automation relay failed: {}", e);
                self.send_fallback(session_id, &e.apology(&transcript)).await;
            }
        }
    }

    /// Deliver a locally generated reply as text, then as speech
    ///
    /// Returns once the TTS response head is in; the audio body is relayed
    /// by a background task so the session can buffer new audio meanwhile.
    /// Failures here are reported to the client and logged; there is no
    /// further fallback.
    pub async fn send_fallback(&self, session_id: &str, text: &str) {
        let Some(session) = self.sessions.lookup(session_id) else {
            debug!(session_id = %session_id, "Session gone, dropping fallback reply");
            return;
        };

        if let Err(e) = session.send(OutgoingMessage::direct_response(text)).await {
            debug!(session_id = %session_id, "Dropping fallback reply: {}", e);
            return;
        }

        match self
            .synthesizer
            .request(text, self.tts_fallback_timeout)
            .await
        {
            Ok(pending) => {
                let text = text.to_string();
                tokio::spawn(async move {
                    relay_speech(&session, pending, &text, ReplyKind::Fallback).await;
                });
            }
            Err(e) => {
                error!(session_id = %session_id, "Fallback synthesis failed: {}", e);
                let message = OutgoingMessage::error(
                    ErrorSource::Direct,
                    format!("Error sending direct message: {e}"),
                );
                if let Err(e) = session.send(message).await {
                    debug!(session_id = %session_id, "Dropping error frame: {}", e);
                }
            }
        }
    }

    /// Synthesize an automation reply for a session
    ///
    /// Returns once the TTS response head is in; the audio body is relayed
    /// by a background task. A failure before any audio is streamed is
    /// reported to the client and returned to the caller.
    pub async fn start_reply(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<ReplyDispatch, SynthesisError> {
        let Some(session) = self.sessions.lookup(session_id) else {
            info!(session_id = %session_id, "Reply for disconnected session dropped");
            return Ok(ReplyDispatch::Disconnected);
        };

        let pending = match self.synthesizer.request(text, self.tts_reply_timeout).await {
            Ok(pending) => pending,
            Err(e) => {
                error!(session_id = %session_id, "TTS processing failed: {}", e);
                let message =
                    OutgoingMessage::error(ErrorSource::Tts, format!("TTS processing failed: {e}"));
                if let Err(e) = session.send(message).await {
                    debug!(session_id = %session_id, "Dropping error frame: {}", e);
                }
                return Err(e);
            }
        };

        debug!(
            session_id = %session_id,
            content_type = pending.content_type().unwrap_or("none"),
            "TTS response started"
        );

        let text = text.to_string();
        tokio::spawn(async move {
            relay_speech(&session, pending, &text, ReplyKind::Automation).await;
        });

        Ok(ReplyDispatch::Streaming)
    }

    /// Forget a session and purge its leftover temp artifacts
    ///
    /// Safe to call more than once.
    pub async fn teardown_session(&self, session_id: &str) {
        self.sessions.remove(session_id);
        self.transcriber.purge_session_artifacts(session_id).await;
    }

    async fn notify(&self, session_id: &str, message: OutgoingMessage) {
        let Some(session) = self.sessions.lookup(session_id) else {
            debug!(session_id = %session_id, "Session gone, dropping notification");
            return;
        };
        if let Err(e) = session.send(message).await {
            debug!(session_id = %session_id, "Dropping notification: {}", e);
        }
    }
}
