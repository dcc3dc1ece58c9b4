//! Configuration module for the voice relay server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//!
//! # Example
//! ```rust,no_run
//! use voice_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod yaml;

use crate::utils::url_validation::validate_service_url;

/// Placeholder shipped in sample `.env` files; treated as "not configured"
pub const WEBHOOK_URL_PLACEHOLDER: &str = "YOUR_N8N_WEBHOOK_RECEIVE_TEXT_URL";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_STT_URL: &str = "http://whisper-api:9000/transcribe";
pub const DEFAULT_TTS_URL: &str = "http://coqui-tts-api:5002/api/tts";

pub const DEFAULT_UTTERANCE_IDLE_TIMEOUT_MS: u64 = 1500;
pub const DEFAULT_AUTOMATION_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TTS_REPLY_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_TTS_FALLBACK_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_STT_TIMEOUT_SECS: u64 = 60;

/// Timeouts applied to the session pipeline and its outbound calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Silence after the last audio chunk before an utterance is finalized
    pub utterance_idle: Duration,
    /// Hard limit on the automation webhook request (the request is aborted on expiry)
    pub automation: Duration,
    /// TTS limit for replies delivered through the intake endpoint
    pub tts_reply: Duration,
    /// TTS limit for locally generated fallback replies
    pub tts_fallback: Duration,
    /// STT upload limit
    pub stt: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            utterance_idle: Duration::from_millis(DEFAULT_UTTERANCE_IDLE_TIMEOUT_MS),
            automation: Duration::from_secs(DEFAULT_AUTOMATION_TIMEOUT_SECS),
            tts_reply: Duration::from_secs(DEFAULT_TTS_REPLY_TIMEOUT_SECS),
            tts_fallback: Duration::from_secs(DEFAULT_TTS_FALLBACK_TIMEOUT_SECS),
            stt: Duration::from_secs(DEFAULT_STT_TIMEOUT_SECS),
        }
    }
}

/// Server configuration
///
/// Contains everything needed to run the relay:
/// - Server settings (host, port)
/// - External service endpoints (STT, TTS, automation webhook)
/// - Pipeline timeouts
/// - Outbound TLS and CORS settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // External services
    /// Automation webhook that receives `{sessionId, text}`.
    /// `None` degrades gracefully: transcripts are produced but never relayed.
    pub automation_webhook_url: Option<String>,
    /// Speech-to-text endpoint accepting a multipart `file` upload
    pub stt_url: String,
    /// Text-to-speech endpoint accepting `{text}`
    pub tts_url: String,

    /// Directory holding per-utterance temp artifacts
    pub audio_temp_dir: PathBuf,

    pub timeouts: TimeoutConfig,

    /// Accept self-signed certificates on outbound HTTPS calls
    pub allow_insecure_tls: bool,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// The `.env` file is loaded in `main.rs` before this is called, so its values
    /// are visible here as regular environment variables.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether transcripts can be forwarded to the automation system
    pub fn has_automation_webhook(&self) -> bool {
        self.automation_webhook_url.is_some()
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        validate_service_url(&self.stt_url).map_err(|e| format!("Invalid STT URL: {e}"))?;
        validate_service_url(&self.tts_url).map_err(|e| format!("Invalid TTS URL: {e}"))?;
        if let Some(ref webhook) = self.automation_webhook_url {
            validate_service_url(webhook)
                .map_err(|e| format!("Invalid automation webhook URL: {e}"))?;
        }

        let timeouts = [
            ("utterance idle", self.timeouts.utterance_idle),
            ("automation", self.timeouts.automation),
            ("TTS reply", self.timeouts.tts_reply),
            ("TTS fallback", self.timeouts.tts_fallback),
            ("STT", self.timeouts.stt),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(format!("{name} timeout must be greater than zero").into());
            }
        }

        Ok(())
    }
}

/// Normalize a configured webhook URL, treating blanks and the sample placeholder as unset
pub(crate) fn normalize_webhook_url(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != WEBHOOK_URL_PLACEHOLDER)
}
