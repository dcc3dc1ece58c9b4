//! URL validation for configured service endpoints
//!
//! The STT, TTS and automation services usually live on a private network
//! (docker service names, LAN addresses), so unlike public webhook targets they
//! are only checked for shape:
//! - The URL must be absolute and parseable
//! - The scheme must be `http` or `https`
//! - The URL must have a host

use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be http or https, got: {0}")]
    UnsupportedScheme(String),

    #[error("URL must have a host")]
    MissingHost,
}

/// Validates a service endpoint URL
///
/// # Example
/// ```rust
/// use voice_relay::utils::url_validation::validate_service_url;
///
/// assert!(validate_service_url("http://whisper-api:9000/transcribe").is_ok());
/// assert!(validate_service_url("ftp://files.example.com/tts").is_err());
/// assert!(validate_service_url("/api/tts").is_err());
/// ```
pub fn validate_service_url(url: &str) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(UrlValidationError::UnsupportedScheme(other.to_string())),
    }

    if parsed.host().is_none() {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(parsed)
}
