//! Helpers shared by the outbound service clients

use serde::Deserialize;

/// Longest raw body echoed into an error message
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Error envelope returned by the speech services
///
/// Whisper-style services answer `{"error": "..."}`; FastAPI-based ones
/// answer `{"detail": "..."}`.
#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

/// Extract a readable message from an upstream error body
pub fn describe_error_body(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ServiceErrorBody>(body)
        && let Some(message) = parsed.error.or(parsed.detail)
    {
        return message;
    }

    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{truncated}...")
    } else {
        trimmed.to_string()
    }
}
