//! HTTP API handlers

mod health;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::mcp::create_mcp_service;
use crate::AppState;

/// Create the HTTP router: health check plus the streamable HTTP MCP endpoint
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new().route("/health", get(health::health_check));
    let mcp_path = state.config.mcp_path.clone();

    Router::new()
        .nest("/api/v1", api_routes)
        .nest_service(&mcp_path, create_mcp_service(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
