use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override the environment.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3000
///
/// services:
///   automation_webhook_url: "https://n8n.example.com/webhook/voice"
///   stt_url: "http://whisper-api:9000/transcribe"
///   tts_url: "http://coqui-tts-api:5002/api/tts"
///   audio_temp_dir: "/var/tmp/voice-relay"
///   allow_insecure_tls: false
///
/// timeouts:
///   utterance_idle_ms: 1500
///   automation_secs: 10
///   tts_reply_secs: 180
///   tts_fallback_secs: 120
///   stt_secs: 60
///
/// security:
///   cors_allowed_origins: "*"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub services: Option<ServicesYaml>,
    pub timeouts: Option<TimeoutsYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// External service endpoints from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServicesYaml {
    pub automation_webhook_url: Option<String>,
    pub stt_url: Option<String>,
    pub tts_url: Option<String>,
    pub audio_temp_dir: Option<String>,
    pub allow_insecure_tls: Option<bool>,
}

/// Pipeline timeouts from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TimeoutsYaml {
    pub utterance_idle_ms: Option<u64>,
    pub automation_secs: Option<u64>,
    pub tts_reply_secs: Option<u64>,
    pub tts_fallback_secs: Option<u64>,
    pub stt_secs: Option<u64>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
