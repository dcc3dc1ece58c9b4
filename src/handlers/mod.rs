//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `reply` - Automation reply intake
//! - `ws` - Voice WebSocket gateway

pub mod api;
pub mod reply;
pub mod ws;

// Re-export commonly used handlers for convenient access
pub use reply::handle_automation_reply;
pub use ws::ws_voice_handler;
