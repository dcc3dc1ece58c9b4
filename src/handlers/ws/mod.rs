//! Voice WebSocket gateway
//!
//! See [`crate::core::session::messages`] for the wire protocol.

mod handler;
pub mod session;

pub use handler::ws_voice_handler;
pub use session::{SessionEnd, UtteranceCallback, drive_session};
