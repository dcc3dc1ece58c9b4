mod streamer;

pub use streamer::{
    NON_AUDIO_REPLY_ERROR, PendingSpeech, ReplyKind, SpeechSynthesizer, SynthesisError,
    SynthesizedSpeech, relay_speech,
};
