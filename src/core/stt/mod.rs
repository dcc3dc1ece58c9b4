mod client;
pub mod messages;

pub use client::{TranscriptionClient, TranscriptionError, artifact_prefix};
pub use messages::{TranscriptionResponse, TranscriptionResultEntry};
