//! Reply intake endpoint
//!
//! The automation posts `{sessionId, textResponse}` here once it has an
//! answer. The handler waits only until synthesis has started; audio is
//! relayed to the client in the background.

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::core::ReplyDispatch;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

pub const MISSING_FIELDS_MESSAGE: &str = "Missing sessionId or textResponse";
pub const PROCESSING_MESSAGE: &str = "Response is being processed.";
pub const DISCONNECTED_MESSAGE: &str = "Client disconnected.";
pub const SYNTHESIS_FAILED_MESSAGE: &str = "Internal server error during audio processing.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationReply {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub text_response: Option<String>,
}

impl AutomationReply {
    /// Both fields, when present and non-empty
    fn fields(&self) -> Option<(&str, &str)> {
        let session_id = self.session_id.as_deref().filter(|s| !s.is_empty())?;
        let text = self.text_response.as_deref().filter(|t| !t.is_empty())?;
        Some((session_id, text))
    }
}

/// `POST /handle-n8n-response`
pub async fn handle_automation_reply(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AutomationReply>, JsonRejection>,
) -> AppResult<(StatusCode, &'static str)> {
    let reply = match payload {
        Ok(Json(reply)) => reply,
        Err(rejection) => {
            warn!("Rejected automation reply: {}", rejection.body_text());
            return Err(AppError::BadRequest(MISSING_FIELDS_MESSAGE.to_string()));
        }
    };

    let Some((session_id, text)) = reply.fields() else {
        warn!("Automation reply without sessionId or textResponse");
        return Err(AppError::BadRequest(MISSING_FIELDS_MESSAGE.to_string()));
    };

    info!(session_id = %session_id, "Automation reply received");

    match state.pipeline.start_reply(session_id, text).await {
        Ok(ReplyDispatch::Streaming) => Ok((StatusCode::OK, PROCESSING_MESSAGE)),
        Ok(ReplyDispatch::Disconnected) => Ok((StatusCode::OK, DISCONNECTED_MESSAGE)),
        Err(_) => Err(AppError::Internal(SYNTHESIS_FAILED_MESSAGE.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(json: &str) -> AutomationReply {
        serde_json::from_str(json).expect("valid reply")
    }

    #[test]
    fn test_fields_present() {
        let parsed = reply(r#"{"sessionId": "s1", "textResponse": "Hello"}"#);
        assert_eq!(parsed.fields(), Some(("s1", "Hello")));
    }

    #[test]
    fn test_missing_or_empty_fields() {
        assert!(reply(r#"{"sessionId": "s1"}"#).fields().is_none());
        assert!(reply(r#"{"textResponse": "Hello"}"#).fields().is_none());
        assert!(reply(r#"{"sessionId": "", "textResponse": "Hello"}"#).fields().is_none());
        assert!(reply(r#"{"sessionId": "s1", "textResponse": ""}"#).fields().is_none());
        assert!(reply("{}").fields().is_none());
    }
}
