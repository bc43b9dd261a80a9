//! Project API Handlers
//!
//! Minimal project and membership management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use trellis_core::domain::project::Project;
use trellis_core::dto::project::{AddMember, CreateProject};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::project_service;

/// POST /project/create
pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    tracing::info!("Creating project: {}", req.path_with_namespace);

    let project = project_service::create_project(&state.pool, req).await?;

    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /project/{id}
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    tracing::debug!("Getting project: {}", id);

    let project = project_service::get_project(&state.pool, id).await?;

    Ok(Json(project))
}

/// POST /project/{id}/member
/// Add a member or change their access level
pub async fn add_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddMember>,
) -> ApiResult<StatusCode> {
    tracing::info!("Adding member {} to project {}", req.username, id);

    project_service::add_member(&state.pool, id, req).await?;

    Ok(StatusCode::NO_CONTENT)
}
