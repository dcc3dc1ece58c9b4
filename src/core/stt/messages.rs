//! Response types for the speech-to-text service
//!
//! The service answers either `{"text": "..."}` or
//! `{"results": [{"transcript": "..."}, ...]}`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TranscriptionResponse {
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub results: Option<Vec<TranscriptionResultEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TranscriptionResultEntry {
    #[serde(default)]
    pub transcript: Option<String>,
}

impl TranscriptionResponse {
    /// The transcript, or `None` when neither shape carries non-empty text
    ///
    /// `text` wins when non-empty; otherwise the first result entry is used.
    pub fn transcript(&self) -> Option<&str> {
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            return Some(text);
        }

        self.results
            .as_ref()
            .and_then(|results| results.first())
            .and_then(|first| first.transcript.as_deref())
            .filter(|t| !t.is_empty())
    }
}
