pub mod automation;
pub mod pipeline;
pub mod session;
pub mod stt;
pub mod tts;
mod upstream;

// Re-export commonly used types for convenience
pub use automation::{AutomationRelay, RelayError, RelayOutcome, SkipReason};
pub use pipeline::{ReplyDispatch, VoicePipeline};
pub use session::{
    ErrorSource, MessageRoute, OutgoingMessage, SessionHandle, SessionRegistry, Utterance,
    UtteranceBuffer,
};
pub use stt::{TranscriptionClient, TranscriptionError};
pub use tts::{SpeechSynthesizer, SynthesisError};
