//! Pipeline Repository
//!
//! Handles all database operations related to pipelines.

use async_trait::async_trait;
use sqlx::PgPool;
use trellis_core::StoreError;
use trellis_core::domain::pipeline::{Pipeline, PipelineStatus};
use trellis_core::ports::PipelineRepository;
use uuid::Uuid;

/// Insert a pipeline and return its new id
pub async fn insert(pool: &PgPool, pipeline: &Pipeline) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO pipelines (
            id, project_id, ref, sha, before_sha, tag, yaml_errors, status, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(id)
    .bind(pipeline.project_id)
    .bind(&pipeline.ref_name)
    .bind(&pipeline.sha)
    .bind(&pipeline.before_sha)
    .bind(pipeline.tag)
    .bind(&pipeline.yaml_errors)
    .bind(status_to_string(pipeline.status))
    .bind(pipeline.created_at)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Update pipeline status
pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: PipelineStatus,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE pipelines SET status = $1 WHERE id = $2")
        .bind(status_to_string(status))
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Find a pipeline by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Pipeline>, sqlx::Error> {
    let row = sqlx::query_as::<_, PipelineRow>(
        r#"
        SELECT id, project_id, ref, sha, before_sha, tag, yaml_errors, status, created_at
        FROM pipelines
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List pipelines of a project, newest first
pub async fn list_by_project(pool: &PgPool, project_id: Uuid) -> Result<Vec<Pipeline>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PipelineRow>(
        r#"
        SELECT id, project_id, ref, sha, before_sha, tag, yaml_errors, status, created_at
        FROM pipelines
        WHERE project_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Delete a pipeline by ID; its builds go with it
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM pipelines WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Port Adapter
// =============================================================================

/// [`PipelineRepository`] on top of the pipelines table
#[derive(Clone)]
pub struct PgPipelineRepository {
    pool: PgPool,
}

impl PgPipelineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PipelineRepository for PgPipelineRepository {
    async fn insert(&self, pipeline: &Pipeline) -> Result<Uuid, StoreError> {
        insert(&self.pool, pipeline)
            .await
            .map_err(StoreError::backend)
    }

    async fn enqueue(&self, pipeline_id: Uuid) -> Result<(), StoreError> {
        let updated = update_status(&self.pool, pipeline_id, PipelineStatus::Pending)
            .await
            .map_err(StoreError::backend)?;

        if !updated {
            return Err(StoreError::NotFound(format!("pipeline {}", pipeline_id)));
        }

        tracing::debug!("Pipeline {} enqueued", pipeline_id);
        Ok(())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn status_to_string(status: PipelineStatus) -> &'static str {
    match status {
        PipelineStatus::Created => "created",
        PipelineStatus::Pending => "pending",
    }
}

fn string_to_status(s: &str) -> PipelineStatus {
    match s {
        "pending" => PipelineStatus::Pending,
        _ => PipelineStatus::Created,
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    id: Uuid,
    project_id: Uuid,
    #[sqlx(rename = "ref")]
    ref_name: String,
    sha: Option<String>,
    before_sha: String,
    tag: bool,
    yaml_errors: Option<String>,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<PipelineRow> for Pipeline {
    fn from(row: PipelineRow) -> Self {
        Pipeline {
            id: Some(row.id),
            project_id: row.project_id,
            ref_name: row.ref_name,
            sha: row.sha,
            before_sha: row.before_sha,
            tag: row.tag,
            yaml_errors: row.yaml_errors,
            status: string_to_status(&row.status),
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        for status in [PipelineStatus::Created, PipelineStatus::Pending] {
            assert_eq!(string_to_status(status_to_string(status)), status);
            assert_eq!(status_to_string(status), status.to_string());
        }
        assert_eq!(string_to_status("bogus"), PipelineStatus::Created);
    }
}
