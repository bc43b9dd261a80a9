//! Pipeline API Handlers
//!
//! HTTP endpoints for pipeline creation and inspection.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use trellis_core::PipelineOutcome;
use trellis_core::domain::build::Build;
use trellis_core::domain::pipeline::Pipeline;
use trellis_core::dto::pipeline::CreatePipelineRequest;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::pipeline_service;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub project_id: Uuid,
}

/// POST /pipeline/create
/// Assemble a pipeline for a ref; 201 when assembled, 422 when rejected
pub async fn create_pipeline(
    State(state): State<AppState>,
    Json(req): Json<CreatePipelineRequest>,
) -> ApiResult<(StatusCode, Json<PipelineOutcome>)> {
    tracing::info!(
        "Creating pipeline for project {} at {}",
        req.project_id,
        req.params.ref_name
    );

    let outcome = pipeline_service::create_pipeline(
        &state.pool,
        &state.assembler,
        req,
        state.request_timeout,
    )
    .await?;

    let status = if outcome.is_assembled() {
        StatusCode::CREATED
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };

    Ok((status, Json(outcome)))
}

/// GET /pipeline/list?project_id=
/// List pipelines of a project, newest first
pub async fn list_pipelines(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Pipeline>>> {
    tracing::debug!("Listing pipelines of project {}", query.project_id);

    let pipelines = pipeline_service::list_pipelines(&state.pool, query.project_id).await?;

    Ok(Json(pipelines))
}

/// GET /pipeline/{id}
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Pipeline>> {
    tracing::debug!("Getting pipeline: {}", id);

    let pipeline = pipeline_service::get_pipeline(&state.pool, id).await?;

    Ok(Json(pipeline))
}

/// GET /pipeline/{id}/builds
/// Builds of a pipeline in stage order
pub async fn list_builds(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Build>>> {
    tracing::debug!("Listing builds of pipeline: {}", id);

    let builds = pipeline_service::list_builds(&state.pool, id).await?;

    Ok(Json(builds))
}

/// DELETE /pipeline/{id}
pub async fn delete_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting pipeline: {}", id);

    pipeline_service::delete_pipeline(&state.pool, id).await?;

    Ok(StatusCode::NO_CONTENT)
}
