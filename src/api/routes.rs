//! Route table

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::handlers;
use crate::AppState;

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/providers", get(handlers::list_providers))
        .route("/v1/usage", get(handlers::usage))
        .route("/v1/operations", post(handlers::execute_operation))
        .route("/v1/images/alternatives", post(handlers::generate_alternatives))
        .route("/v1/conversations", post(handlers::create_conversation))
        .route("/v1/conversations/:id", delete(handlers::close_conversation))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
