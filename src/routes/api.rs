use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, reply};
use crate::state::AppState;
use std::sync::Arc;

/// Create the HTTP API router
///
/// - `GET /health` - health check
/// - `POST /handle-n8n-response` - automation reply intake
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(api::health_check))
        .route("/handle-n8n-response", post(reply::handle_automation_reply))
        .layer(TraceLayer::new_for_http())
}
