//! Transcription client
//!
//! Stages one utterance in a scoped temp file, uploads it to the STT service
//! as a multipart `file` field and extracts the transcript from the reply.
//! The temp file is removed once the request finishes, whatever the outcome.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use super::messages::TranscriptionResponse;
use crate::core::upstream::describe_error_body;

const UPLOAD_FIELD: &str = "file";
const UPLOAD_FILE_NAME: &str = "audio.wav";
const UPLOAD_MIME: &str = "audio/wav";

/// Transcription failures; the affected utterance is abandoned
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("STT service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("STT request timed out")]
    Timeout,

    #[error("STT request failed: {0}")]
    Network(String),

    #[error("Failed to stage audio artifact: {0}")]
    TempFile(#[from] io::Error),

    #[error("Invalid STT response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for TranscriptionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// File-name prefix shared by every artifact of one session
pub fn artifact_prefix(session_id: &str) -> String {
    format!("utterance_{session_id}_")
}

#[derive(Debug, Clone)]
pub struct TranscriptionClient {
    http: Client,
    endpoint: String,
    temp_dir: PathBuf,
    timeout: Duration,
}

impl TranscriptionClient {
    pub fn new(
        http: Client,
        endpoint: impl Into<String>,
        temp_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            temp_dir: temp_dir.into(),
            timeout,
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Transcribe one utterance
    ///
    /// Returns `Ok(None)` when the service found no speech.
    pub async fn transcribe(
        &self,
        session_id: &str,
        audio: &[u8],
    ) -> Result<Option<String>, TranscriptionError> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;

        let artifact = tempfile::Builder::new()
            .prefix(&artifact_prefix(session_id))
            .suffix(".wav")
            .tempfile_in(&self.temp_dir)?;

        debug!(
            session_id = %session_id,
            path = %artifact.path().display(),
            bytes = audio.len(),
            "Staged utterance for transcription"
        );

        let result = self.upload(artifact.path(), audio).await;

        let path = artifact.path().to_path_buf();
        if let Err(e) = artifact.close() {
            warn!(
                session_id = %session_id,
                path = %path.display(),
                "Failed to remove audio artifact: {}", e
            );
        }

        result
    }

    async fn upload(
        &self,
        path: &Path,
        audio: &[u8],
    ) -> Result<Option<String>, TranscriptionError> {
        tokio::fs::write(path, audio).await?;

        let file = tokio::fs::File::open(path).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let file_part = Part::stream_with_length(body, audio.len() as u64)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(UPLOAD_MIME)?;
        let form = Form::new().part(UPLOAD_FIELD, file_part);

        let response = self
            .http
            .post(&self.endpoint)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(TranscriptionError::Upstream {
                status: status.as_u16(),
                message: describe_error_body(&response_text),
            });
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&response_text)
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        let transcript = parsed.transcript().map(str::to_string);
        match &transcript {
            Some(text) => info!("Transcription complete: {} characters", text.len()),
            None => info!("Transcription returned no speech"),
        }
        Ok(transcript)
    }

    /// Remove leftover artifacts of a session; returns how many were deleted
    ///
    /// Best-effort: a missing directory or an undeletable file is only logged.
    pub async fn purge_session_artifacts(&self, session_id: &str) -> usize {
        let prefix = artifact_prefix(session_id);

        let mut entries = match tokio::fs::read_dir(&self.temp_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(session_id = %session_id, "Failed to scan audio temp dir: {}", e);
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(session_id = %session_id, "Failed to scan audio temp dir: {}", e);
                    break;
                }
            };

            if !entry.file_name().to_string_lossy().starts_with(&prefix) {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(
                    session_id = %session_id,
                    path = %entry.path().display(),
                    "Failed to remove audio artifact: {}", e
                ),
            }
        }

        if removed > 0 {
            info!(session_id = %session_id, removed, "Purged leftover audio artifacts");
        }
        removed
    }
}
