use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::{SessionRegistry, VoicePipeline};

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    pub pipeline: Arc<VoicePipeline>,
}

impl AppState {
    /// Build the state, including the shared outbound HTTP client
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, reqwest::Error> {
        let sessions = Arc::new(SessionRegistry::new());
        let pipeline = Arc::new(VoicePipeline::from_config(&config, sessions)?);
        Ok(Arc::new(Self { config, pipeline }))
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        self.pipeline.sessions()
    }
}
