//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use voice_relay::config::{ServerConfig, TimeoutConfig};
use voice_relay::core::session::{MessageRoute, SessionHandle, Utterance, UtteranceBuffer};
use voice_relay::state::AppState;
use wiremock::MockServer;

pub const STT_PATH: &str = "/transcribe";
pub const TTS_PATH: &str = "/api/tts";
pub const WEBHOOK_PATH: &str = "/webhook/voice";

/// Configuration pointing every service at `server`
pub fn test_config(server: &MockServer, temp_dir: &Path, with_webhook: bool) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        automation_webhook_url: with_webhook.then(|| format!("{}{}", server.uri(), WEBHOOK_PATH)),
        stt_url: format!("{}{}", server.uri(), STT_PATH),
        tts_url: format!("{}{}", server.uri(), TTS_PATH),
        audio_temp_dir: temp_dir.to_path_buf(),
        timeouts: TimeoutConfig {
            automation: Duration::from_millis(500),
            ..TimeoutConfig::default()
        },
        allow_insecure_tls: false,
        cors_allowed_origins: None,
    }
}

pub fn test_state(server: &MockServer, temp_dir: &Path, with_webhook: bool) -> Arc<AppState> {
    AppState::new(test_config(server, temp_dir, with_webhook)).expect("state")
}

/// Register a fake client connection and return its outbound queue
pub fn connect_session(state: &AppState, session_id: &str) -> mpsc::Receiver<MessageRoute> {
    let (tx, rx) = mpsc::channel(32);
    state
        .sessions()
        .register(SessionHandle::new(session_id, tx));
    rx
}

/// A finalized utterance holding `audio`
pub fn utterance(audio: &'static [u8]) -> Utterance {
    let mut buffer = UtteranceBuffer::new(Duration::from_secs(1));
    buffer.push(Bytes::from_static(audio), Instant::now());
    buffer.finalize().expect("utterance")
}

/// Next queued frame, failing the test if none arrives in time
pub async fn next_route(rx: &mut mpsc::Receiver<MessageRoute>) -> MessageRoute {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("session channel closed")
}

/// Next queued frame as JSON
pub async fn next_json(rx: &mut mpsc::Receiver<MessageRoute>) -> serde_json::Value {
    match next_route(rx).await {
        MessageRoute::Outgoing(message) => serde_json::to_value(message).expect("serializable"),
        MessageRoute::Audio(data) => panic!("expected JSON frame, got {} audio bytes", data.len()),
    }
}

/// Next queued frame as audio
pub async fn next_audio(rx: &mut mpsc::Receiver<MessageRoute>) -> Bytes {
    match next_route(rx).await {
        MessageRoute::Audio(data) => data,
        MessageRoute::Outgoing(message) => panic!("expected audio frame, got {message:?}"),
    }
}

pub fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

/// Raw TTS endpoint for stream failure cases
///
/// Answers a single request with `audio/wav` headers announcing
/// `content_length` bytes and then writes `head`. With `tail` set, the rest
/// of the body is written once the receiver fires; otherwise the connection
/// is closed right after `head`. Returns the TTS URL.
pub async fn spawn_raw_tts(
    content_length: usize,
    head: &'static [u8],
    tail: Option<(oneshot::Receiver<()>, &'static [u8])>,
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        read_request(&mut stream).await;

        let headers = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: audio/wav\r\ncontent-length: {content_length}\r\nconnection: close\r\n\r\n"
        );
        if stream.write_all(headers.as_bytes()).await.is_err()
            || stream.write_all(head).await.is_err()
            || stream.flush().await.is_err()
        {
            return;
        }

        if let Some((release, rest)) = tail {
            let _ = release.await;
            let _ = stream.write_all(rest).await;
            let _ = stream.flush().await;
        }
        let _ = stream.shutdown().await;
    });
    format!("http://{addr}{TTS_PATH}")
}

async fn read_request(stream: &mut TcpStream) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        request.extend_from_slice(&chunk[..n]);
        let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
        let body_len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if request.len() >= end + 4 + body_len {
            return;
        }
    }
}
