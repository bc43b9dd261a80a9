//! Pipeline Service
//!
//! Business logic for pipeline creation and inspection.

use sqlx::PgPool;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use trellis_core::domain::build::Build;
use trellis_core::domain::pipeline::Pipeline;
use trellis_core::dto::pipeline::CreatePipelineRequest;
use trellis_core::{CreatePipelineService, PipelineOutcome};
use uuid::Uuid;

use crate::repository::{build_repository, pipeline_repository, project_repository};

/// Service error type
#[derive(Debug)]
pub enum PipelineError {
    NotFound(String),
    ValidationError(String),
    DatabaseError(sqlx::Error),
    InternalError(String),
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Run the pipeline assembler for a creation request
///
/// The assembler runs on its own task. If the caller goes away, or `timeout`
/// elapses, its cancellation token fires and the assembler stops at the next
/// gate; once the pipeline row is written the remaining steps always finish.
pub async fn create_pipeline(
    pool: &PgPool,
    assembler: &CreatePipelineService,
    req: CreatePipelineRequest,
    timeout: Duration,
) -> Result<PipelineOutcome> {
    validate_create_request(&req)?;

    let project = project_repository::find_by_id(pool, req.project_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("Project {} not found", req.project_id)))?;

    let user = project_repository::find_user(pool, req.user_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("User {} not found", req.user_id)))?;

    let cancel = CancellationToken::new();
    // Fires on timeout, or when this future is dropped
    let _guard = cancel.clone().drop_guard();

    let task = tokio::spawn({
        let assembler = assembler.clone();
        let cancel = cancel.clone();
        async move {
            assembler
                .execute_with_cancellation(&project, &user, &req.params, &cancel)
                .await
        }
    });

    let timer = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(timeout).await;
            tracing::warn!("Pipeline creation timed out after {:?}", timeout);
            cancel.cancel();
        }
    });

    let outcome = task.await;
    timer.abort();

    outcome.map_err(|e| PipelineError::InternalError(format!("Pipeline assembly failed: {}", e)))
}

/// Get a pipeline by ID
pub async fn get_pipeline(pool: &PgPool, id: Uuid) -> Result<Pipeline> {
    let pipeline = pipeline_repository::find_by_id(pool, id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("Pipeline {} not found", id)))?;

    Ok(pipeline)
}

/// List the pipelines of a project, newest first
pub async fn list_pipelines(pool: &PgPool, project_id: Uuid) -> Result<Vec<Pipeline>> {
    project_repository::find_by_id(pool, project_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("Project {} not found", project_id)))?;

    let pipelines = pipeline_repository::list_by_project(pool, project_id).await?;
    Ok(pipelines)
}

/// List the builds of a pipeline in stage order
pub async fn list_builds(pool: &PgPool, pipeline_id: Uuid) -> Result<Vec<Build>> {
    get_pipeline(pool, pipeline_id).await?;

    let builds = build_repository::find_by_pipeline(pool, pipeline_id).await?;
    Ok(builds)
}

/// Delete a pipeline and its builds
pub async fn delete_pipeline(pool: &PgPool, id: Uuid) -> Result<()> {
    let deleted = pipeline_repository::delete(pool, id).await?;

    if !deleted {
        return Err(PipelineError::NotFound(format!("Pipeline {} not found", id)));
    }

    tracing::info!("Pipeline deleted: {}", id);

    Ok(())
}

// =============================================================================
// Validation
// =============================================================================

fn validate_create_request(req: &CreatePipelineRequest) -> Result<()> {
    let ref_name = req.params.ref_name.trim();

    if ref_name.is_empty() {
        return Err(PipelineError::ValidationError(
            "Ref cannot be empty".to_string(),
        ));
    }

    if ref_name.len() > 255 {
        return Err(PipelineError::ValidationError(
            "Ref is too long (max 255 characters)".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::dto::pipeline::CreatePipeline;

    fn request(ref_name: &str) -> CreatePipelineRequest {
        CreatePipelineRequest {
            project_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            params: CreatePipeline::new(ref_name),
        }
    }

    #[test]
    fn test_validate_empty_ref() {
        let result = validate_create_request(&request("  "));
        assert!(matches!(result, Err(PipelineError::ValidationError(_))));
    }

    #[test]
    fn test_validate_long_ref() {
        let result = validate_create_request(&request(&"a".repeat(256)));
        assert!(matches!(result, Err(PipelineError::ValidationError(_))));
    }

    #[test]
    fn test_validate_valid_request() {
        assert!(validate_create_request(&request("refs/heads/main")).is_ok());
    }
}
