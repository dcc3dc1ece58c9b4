//! Utterance pipeline tests
//!
//! Run finalized utterances through transcription, the automation relay and
//! the fallback path against wiremock services.

mod common;

use std::time::Duration;

use bytes::Bytes;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::time::Instant;
use voice_relay::core::session::{MessageRoute, UtteranceBuffer};
use voice_relay::state::AppState;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{
    STT_PATH, TTS_PATH, WEBHOOK_PATH, connect_session, dir_is_empty, next_audio, next_json,
    spawn_raw_tts, test_config, test_state, utterance,
};

const UNREACHABLE_APOLOGY: &str = "I received your message: \"turn on the lights\", but I'm currently unable to connect to the AI service. Please check your internet connection or try again later.";
const TROUBLE_APOLOGY: &str = "I received your message: \"turn on the lights\", but I'm having trouble processing it. Please try again later.";

async fn mount_stt(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(STT_PATH))
        .respond_with(template)
        .mount(server)
        .await;
}

async fn mount_transcript(server: &MockServer, text: &str) {
    mount_stt(
        server,
        ResponseTemplate::new(200).set_body_json(json!({"text": text})),
    )
    .await;
}

async fn mount_webhook(server: &MockServer, template: ResponseTemplate, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .respond_with(template)
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_tts(server: &MockServer, template: ResponseTemplate, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(TTS_PATH))
        .respond_with(template)
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn assert_no_more_frames(rx: &mut tokio::sync::mpsc::Receiver<MessageRoute>) {
    assert!(rx.try_recv().is_err(), "unexpected extra frame");
}

#[tokio::test]
async fn test_transcript_is_relayed_to_automation() {
    let server = MockServer::start().await;
    mount_transcript(&server, "turn on the lights").await;
    Mock::given(method("POST"))
        .and(path(WEBHOOK_PATH))
        .and(body_json(json!({"sessionId": "s1", "text": "turn on the lights"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    mount_tts(&server, ResponseTemplate::new(200), 0).await;

    let temp = TempDir::new().unwrap();
    let state = test_state(&server, temp.path(), true);
    let mut rx = connect_session(&state, "s1");

    state
        .pipeline
        .process_utterance("s1", utterance(b"RIFFaudio"))
        .await;

    // The reply arrives later through the intake endpoint
    assert_no_more_frames(&mut rx);
    assert!(dir_is_empty(temp.path()));
}

#[tokio::test]
async fn test_empty_transcript_skips_automation() {
    let server = MockServer::start().await;
    mount_transcript(&server, "").await;
    mount_webhook(&server, ResponseTemplate::new(200), 0).await;

    let temp = TempDir::new().unwrap();
    let state = test_state(&server, temp.path(), true);
    let mut rx = connect_session(&state, "s1");

    state.pipeline.process_utterance("s1", utterance(b"hiss")).await;

    assert_eq!(next_json(&mut rx).await, json!({"event": "noSpeechDetected"}));
    assert_no_more_frames(&mut rx);
}

#[tokio::test]
async fn test_stt_failure_reports_error_frame() {
    let server = MockServer::start().await;
    mount_stt(
        &server,
        ResponseTemplate::new(500).set_body_json(json!({"error": "decoder crashed"})),
    )
    .await;
    mount_webhook(&server, ResponseTemplate::new(200), 0).await;

    let temp = TempDir::new().unwrap();
    let state = test_state(&server, temp.path(), true);
    let mut rx = connect_session(&state, "s1");

    state.pipeline.process_utterance("s1", utterance(b"RIFF")).await;

    assert_eq!(
        next_json(&mut rx).await,
        json!({
            "type": "error",
            "source": "stt",
            "message": "STT processing failed: STT service returned 500: decoder crashed"
        })
    );
    assert!(dir_is_empty(temp.path()));
}

#[tokio::test]
async fn test_automation_timeout_delivers_spoken_apology() {
    let server = MockServer::start().await;
    mount_transcript(&server, "turn on the lights").await;
    mount_webhook(
        &server,
        ResponseTemplate::new(200).set_delay(Duration::from_secs(5)),
        1,
    )
    .await;
    Mock::given(method("POST"))
        .and(path(TTS_PATH))
        .and(body_json(json!({"text": UNREACHABLE_APOLOGY})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(&b"RIFFsorry"[..], "audio/wav"))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let state = test_state(&server, temp.path(), true);
    let mut rx = connect_session(&state, "s1");

    state.pipeline.process_utterance("s1", utterance(b"RIFF")).await;

    assert_eq!(
        next_json(&mut rx).await,
        json!({"type": "directResponse", "text": UNREACHABLE_APOLOGY})
    );
    assert_eq!(next_audio(&mut rx).await.as_ref(), b"RIFFsorry");
    assert_eq!(next_json(&mut rx).await, json!({"event": "audioEnd"}));
}

#[tokio::test]
async fn test_automation_error_status_uses_trouble_apology() {
    let server = MockServer::start().await;
    mount_transcript(&server, "turn on the lights").await;
    mount_webhook(&server, ResponseTemplate::new(500), 1).await;
    mount_tts(
        &server,
        ResponseTemplate::new(200).set_body_raw(&b"RIFF"[..], "audio/wav"),
        1,
    )
    .await;

    let temp = TempDir::new().unwrap();
    let state = test_state(&server, temp.path(), true);
    let mut rx = connect_session(&state, "s1");

    state.pipeline.process_utterance("s1", utterance(b"RIFF")).await;

    assert_eq!(
        next_json(&mut rx).await,
        json!({"type": "directResponse", "text": TROUBLE_APOLOGY})
    );
    next_audio(&mut rx).await;
    assert_eq!(next_json(&mut rx).await, json!({"event": "audioEnd"}));
}

#[tokio::test]
async fn test_fallback_synthesis_failure_is_reported_once() {
    let server = MockServer::start().await;
    mount_transcript(&server, "turn on the lights").await;
    mount_webhook(&server, ResponseTemplate::new(503), 1).await;
    mount_tts(&server, ResponseTemplate::new(500), 1).await;

    let temp = TempDir::new().unwrap();
    let state = test_state(&server, temp.path(), true);
    let mut rx = connect_session(&state, "s1");

    state.pipeline.process_utterance("s1", utterance(b"RIFF")).await;

    assert_eq!(
        next_json(&mut rx).await,
        json!({"type": "directResponse", "text": TROUBLE_APOLOGY})
    );
    let frame = next_json(&mut rx).await;
    assert_eq!(frame["type"], "error");
    assert_eq!(frame["source"], "direct");
    assert_no_more_frames(&mut rx);
}

#[tokio::test]
async fn test_fallback_releases_utterance_before_audio_body() {
    let server = MockServer::start().await;
    mount_transcript(&server, "turn on the lights").await;
    mount_webhook(&server, ResponseTemplate::new(503), 1).await;
    let (release_tx, release_rx) = oneshot::channel();
    let tts_url = spawn_raw_tts(8, b"RIFF", Some((release_rx, b"late"))).await;

    let temp = TempDir::new().unwrap();
    let mut config = test_config(&server, temp.path(), true);
    config.tts_url = tts_url;
    let state = AppState::new(config).unwrap();
    let mut rx = connect_session(&state, "s1");

    let mut buffer = UtteranceBuffer::new(Duration::from_secs(1));
    buffer.push(Bytes::from_static(b"RIFF"), Instant::now());
    let finalized = buffer.finalize().unwrap();
    assert!(buffer.is_processing());

    tokio::time::timeout(
        Duration::from_secs(5),
        state.pipeline.process_utterance("s1", finalized),
    )
    .await
    .expect("pipeline waited for the audio body");

    // The body is still held back by the TTS endpoint
    assert!(!buffer.is_processing());
    assert_eq!(
        next_json(&mut rx).await,
        json!({"type": "directResponse", "text": TROUBLE_APOLOGY})
    );
    assert_no_more_frames(&mut rx);

    release_tx.send(()).unwrap();
    assert_eq!(next_audio(&mut rx).await.as_ref(), b"RIFFlate");
    assert_eq!(next_json(&mut rx).await, json!({"event": "audioEnd"}));
}

#[tokio::test]
async fn test_fallback_stream_break_reports_direct_stream_error() {
    let server = MockServer::start().await;
    mount_transcript(&server, "turn on the lights").await;
    mount_webhook(&server, ResponseTemplate::new(503), 1).await;

    let temp = TempDir::new().unwrap();
    let mut config = test_config(&server, temp.path(), true);
    config.tts_url = spawn_raw_tts(100, b"RIFF", None).await;
    let state = AppState::new(config).unwrap();
    let mut rx = connect_session(&state, "s1");

    state.pipeline.process_utterance("s1", utterance(b"RIFF")).await;

    assert_eq!(
        next_json(&mut rx).await,
        json!({"type": "directResponse", "text": TROUBLE_APOLOGY})
    );
    let frame = next_json(&mut rx).await;
    assert_eq!(frame["type"], "error");
    assert_eq!(frame["source"], "tts-direct-stream");
    let message = frame["message"].as_str().unwrap();
    assert!(message.starts_with("Direct audio stream error: "), "{message}");
    assert_no_more_frames(&mut rx);
}

#[tokio::test]
async fn test_unconfigured_webhook_produces_no_reply() {
    let server = MockServer::start().await;
    mount_transcript(&server, "turn on the lights").await;
    mount_tts(&server, ResponseTemplate::new(200), 0).await;

    let temp = TempDir::new().unwrap();
    let state = test_state(&server, temp.path(), false);
    let mut rx = connect_session(&state, "s1");

    state.pipeline.process_utterance("s1", utterance(b"RIFF")).await;

    assert_no_more_frames(&mut rx);
}

#[tokio::test]
async fn test_disconnected_session_gets_no_fallback() {
    let server = MockServer::start().await;
    mount_transcript(&server, "turn on the lights").await;
    mount_webhook(&server, ResponseTemplate::new(500), 1).await;
    mount_tts(&server, ResponseTemplate::new(200), 0).await;

    let temp = TempDir::new().unwrap();
    let state = test_state(&server, temp.path(), true);
    let rx = connect_session(&state, "s1");
    drop(rx);

    state.pipeline.process_utterance("s1", utterance(b"RIFF")).await;
    assert!(state.sessions().is_empty());
}

#[tokio::test]
async fn test_teardown_purges_artifacts_and_is_idempotent() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let state = test_state(&server, temp.path(), true);
    let _rx = connect_session(&state, "s1");

    std::fs::write(temp.path().join("utterance_s1_leftover.wav"), b"x").unwrap();
    std::fs::write(temp.path().join("utterance_s2_other.wav"), b"y").unwrap();

    state.pipeline.teardown_session("s1").await;
    state.pipeline.teardown_session("s1").await;

    assert!(state.sessions().lookup("s1").is_none());
    assert!(!temp.path().join("utterance_s1_leftover.wav").exists());
    assert!(temp.path().join("utterance_s2_other.wav").exists());
}
