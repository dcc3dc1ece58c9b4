//! Automation relay
//!
//! Forwards transcripts to the automation webhook as `{sessionId, text}`.
//! The reply arrives later through the intake endpoint, so a 2xx here only
//! means the automation accepted the work. Failures produce an apology that
//! the caller delivers as a fallback reply.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Body posted to the automation webhook
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationRequest<'a> {
    pub session_id: &'a str,
    pub text: &'a str,
}

/// Why a transcript was not forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyTranscript,
    NotConfigured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The automation answered 2xx
    Delivered,
    Skipped(SkipReason),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Automation webhook timed out after {0:?}")]
    Timeout(Duration),

    #[error("Automation webhook returned status {0}")]
    UpstreamStatus(u16),

    #[error("Automation webhook request failed: {0}")]
    Network(String),
}

impl RelayError {
    /// Spoken acknowledgement for a transcript that could not be relayed
    pub fn apology(&self, transcript: &str) -> String {
        match self {
            Self::UpstreamStatus(_) => format!(
                "I received your message: \"{transcript}\", but I'm having trouble processing it. Please try again later."
            ),
            Self::Timeout(_) | Self::Network(_) => format!(
                "I received your message: \"{transcript}\", but I'm currently unable to connect to the AI service. Please check your internet connection or try again later."
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AutomationRelay {
    http: Client,
    webhook_url: Option<String>,
    timeout: Duration,
}

impl AutomationRelay {
    pub fn new(http: Client, webhook_url: Option<String>, timeout: Duration) -> Self {
        Self {
            http,
            webhook_url,
            timeout,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Post a transcript to the webhook
    ///
    /// The request is aborted once the timeout elapses.
    pub async fn forward(&self, session_id: &str, text: &str) -> Result<RelayOutcome, RelayError> {
        if text.is_empty() {
            debug!(session_id = %session_id, "Empty transcript, nothing to relay");
            return Ok(RelayOutcome::Skipped(SkipReason::EmptyTranscript));
        }

        let Some(url) = self.webhook_url.as_deref() else {
            return Ok(RelayOutcome::Skipped(SkipReason::NotConfigured));
        };

        let request = self
            .http
            .post(url)
            .json(&AutomationRequest { session_id, text })
            .send();

        // Dropping the in-flight future on expiry cancels the request
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| RelayError::Timeout(self.timeout))?
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::Timeout(self.timeout)
                } else {
                    RelayError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::UpstreamStatus(status.as_u16()));
        }

        info!(session_id = %session_id, status = status.as_u16(), "Transcript relayed to automation");
        Ok(RelayOutcome::Delivered)
    }
}
