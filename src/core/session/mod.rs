//! Client sessions: wire protocol, live registry and utterance buffering

pub mod buffer;
pub mod messages;
pub mod registry;

pub use buffer::{BufferState, PushOutcome, Utterance, UtteranceBuffer};
pub use messages::{
    ErrorSource, IncomingMessage, MAX_CONTROL_MESSAGE_SIZE, MessageRoute, OutgoingMessage,
    ProtocolError,
};
pub use registry::{SessionClosed, SessionHandle, SessionRegistry};
