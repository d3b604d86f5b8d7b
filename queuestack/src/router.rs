//! HTTP router for QueueStack

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use queuestack_sqs::{handlers, SqsState};

/// Create the main application router
///
/// SQS accepts actions on the service root and on any queue URL path.
pub fn create_router(state: Arc<SqsState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/_localstack/health", get(health_check))
        .route("/", any(handlers::handle_request))
        .route("/*path", any(handlers::handle_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, r#"{"status": "running", "services": ["sqs"]}"#)
}
