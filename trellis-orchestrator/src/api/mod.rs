//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod pipeline;
pub mod project;

use axum::{
    Router,
    routing::{delete, get, post},
};
use sqlx::PgPool;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use trellis_core::CreatePipelineService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub assembler: CreatePipelineService,
    pub request_timeout: Duration,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Pipeline endpoints
        .route("/pipeline/create", post(pipeline::create_pipeline))
        .route("/pipeline/list", get(pipeline::list_pipelines))
        .route("/pipeline/{id}", get(pipeline::get_pipeline))
        .route("/pipeline/{id}", delete(pipeline::delete_pipeline))
        .route("/pipeline/{id}/builds", get(pipeline::list_builds))
        // Project endpoints
        .route("/project/create", post(project::create_project))
        .route("/project/{id}", get(project::get_project))
        .route("/project/{id}/member", post(project::add_member))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
