//! Merges environment variables (base) with optional YAML overrides

use std::path::PathBuf;
use std::time::Duration;

use super::env::{env_var, parse_bool_env, parse_env};
use super::yaml::YamlConfig;
use super::{
    DEFAULT_AUTOMATION_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_PORT, DEFAULT_STT_TIMEOUT_SECS,
    DEFAULT_STT_URL, DEFAULT_TTS_FALLBACK_TIMEOUT_SECS, DEFAULT_TTS_REPLY_TIMEOUT_SECS,
    DEFAULT_TTS_URL, DEFAULT_UTTERANCE_IDLE_TIMEOUT_MS, ServerConfig, TimeoutConfig,
    normalize_webhook_url,
};

/// Build the final configuration: defaults, then environment, then YAML
pub(crate) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml.unwrap_or_default();
    let server = yaml.server.unwrap_or_default();
    let services = yaml.services.unwrap_or_default();
    let timeouts = yaml.timeouts.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    let host = server
        .host
        .or_else(|| env_var("HOST"))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = match server.port {
        Some(port) => port,
        None => parse_env::<u16>("BACKEND_PORT")?.unwrap_or(DEFAULT_PORT),
    };

    let automation_webhook_url = normalize_webhook_url(
        services
            .automation_webhook_url
            .or_else(|| env_var("N8N_WEBHOOK_URL")),
    );

    let stt_url = services
        .stt_url
        .or_else(|| env_var("WHISPER_API_URL"))
        .unwrap_or_else(|| DEFAULT_STT_URL.to_string());

    let tts_url = services
        .tts_url
        .or_else(|| env_var("COQUI_TTS_API_URL"))
        .unwrap_or_else(|| DEFAULT_TTS_URL.to_string());

    let audio_temp_dir = services
        .audio_temp_dir
        .or_else(|| env_var("AUDIO_TEMP_DIR"))
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("voice-relay"));

    let allow_insecure_tls = match services.allow_insecure_tls {
        Some(flag) => flag,
        None => parse_bool_env("ALLOW_INSECURE_TLS")?.unwrap_or(false),
    };

    let timeouts = TimeoutConfig {
        utterance_idle: Duration::from_millis(resolve(
            timeouts.utterance_idle_ms,
            "UTTERANCE_IDLE_TIMEOUT_MS",
            DEFAULT_UTTERANCE_IDLE_TIMEOUT_MS,
        )?),
        automation: Duration::from_secs(resolve(
            timeouts.automation_secs,
            "AUTOMATION_TIMEOUT_SECS",
            DEFAULT_AUTOMATION_TIMEOUT_SECS,
        )?),
        tts_reply: Duration::from_secs(resolve(
            timeouts.tts_reply_secs,
            "TTS_REPLY_TIMEOUT_SECS",
            DEFAULT_TTS_REPLY_TIMEOUT_SECS,
        )?),
        tts_fallback: Duration::from_secs(resolve(
            timeouts.tts_fallback_secs,
            "TTS_FALLBACK_TIMEOUT_SECS",
            DEFAULT_TTS_FALLBACK_TIMEOUT_SECS,
        )?),
        stt: Duration::from_secs(resolve(
            timeouts.stt_secs,
            "STT_TIMEOUT_SECS",
            DEFAULT_STT_TIMEOUT_SECS,
        )?),
    };

    let cors_allowed_origins = security
        .cors_allowed_origins
        .or_else(|| env_var("CORS_ALLOWED_ORIGINS"));

    Ok(ServerConfig {
        host,
        port,
        automation_webhook_url,
        stt_url,
        tts_url,
        audio_temp_dir,
        timeouts,
        allow_insecure_tls,
        cors_allowed_origins,
    })
}

fn resolve(yaml_value: Option<u64>, env_name: &str, default: u64) -> Result<u64, String> {
    match yaml_value {
        Some(value) => Ok(value),
        None => Ok(parse_env::<u64>(env_name)?.unwrap_or(default)),
    }
}
