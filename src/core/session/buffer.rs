//! Per-session utterance buffer
//!
//! Accumulates binary audio chunks until the client signals the end of an
//! utterance or stops sending for the idle timeout, then hands the
//! concatenated audio to the pipeline exactly once. While a finalized
//! utterance is still being processed, incoming chunks are dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::time::Instant;

/// Observable buffer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    /// Nothing buffered, no utterance in flight
    Idle,
    /// Chunks buffered and idle deadline armed
    Accumulating,
    /// An utterance is being transcribed and relayed
    Finalizing,
}

/// Result of offering a chunk to the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Buffered,
    /// Discarded because an utterance is still in flight
    Dropped,
}

/// Clears the processing flag when the utterance is released
#[derive(Debug)]
struct ProcessingGuard(Arc<AtomicBool>);

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A finalized utterance
///
/// The owning session accepts new audio again once this value is dropped.
#[derive(Debug)]
pub struct Utterance {
    audio: Bytes,
    _guard: ProcessingGuard,
}

impl Utterance {
    pub fn audio(&self) -> &Bytes {
        &self.audio
    }
}

#[derive(Debug)]
pub struct UtteranceBuffer {
    chunks: Vec<Bytes>,
    buffered_bytes: usize,
    deadline: Option<Instant>,
    idle_timeout: Duration,
    processing: Arc<AtomicBool>,
}

impl UtteranceBuffer {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            chunks: Vec::new(),
            buffered_bytes: 0,
            deadline: None,
            idle_timeout,
            processing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> BufferState {
        if self.is_processing() {
            BufferState::Finalizing
        } else if self.chunks.is_empty() {
            BufferState::Idle
        } else {
            BufferState::Accumulating
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Append a chunk and push the idle deadline out to `now + idle_timeout`
    pub fn push(&mut self, chunk: Bytes, now: Instant) -> PushOutcome {
        if self.is_processing() {
            return PushOutcome::Dropped;
        }

        self.buffered_bytes += chunk.len();
        self.chunks.push(chunk);
        self.deadline = Some(now + self.idle_timeout);
        PushOutcome::Buffered
    }

    /// When the buffered audio should be finalized if nothing else arrives
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[cfg(test)]
    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    #[cfg(test)]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Take the buffered audio as one utterance
    ///
    /// Returns `None` when an utterance is already in flight or nothing is
    /// buffered. On success the buffer is empty, the deadline is cleared and
    /// new chunks are dropped until the returned [`Utterance`] is dropped.
    pub fn finalize(&mut self) -> Option<Utterance> {
        if self.is_processing() {
            return None;
        }

        self.deadline = None;
        if self.chunks.is_empty() {
            return None;
        }

        self.processing.store(true, Ordering::Release);

        let mut audio = BytesMut::with_capacity(self.buffered_bytes);
        for chunk in self.chunks.drain(..) {
            audio.extend_from_slice(&chunk);
        }
        self.buffered_bytes = 0;

        Some(Utterance {
            audio: audio.freeze(),
            _guard: ProcessingGuard(self.processing.clone()),
        })
    }

    /// Discard buffered audio and disarm the deadline
    pub fn reset(&mut self) {
        self.chunks.clear();
        self.buffered_bytes = 0;
        self.deadline = None;
    }
}
