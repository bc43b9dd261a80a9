//! Build Repository
//!
//! Handles all database operations related to builds.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use trellis_core::StoreError;
use trellis_core::domain::build::{Build, BuildStatus, NewBuild};
use trellis_core::ports::BuildRepository;
use uuid::Uuid;

/// Insert a batch of builds in one transaction
///
/// Either every build is stored or none is. Input order is kept in the
/// `position` column and in the returned vector.
pub async fn bulk_insert(pool: &PgPool, builds: Vec<NewBuild>) -> Result<Vec<Build>, sqlx::Error> {
    let now = chrono::Utc::now();
    let mut tx = pool.begin().await?;
    let mut created = Vec::with_capacity(builds.len());

    for (position, new_build) in builds.into_iter().enumerate() {
        let build = new_build.into_build(Uuid::new_v4(), now);

        sqlx::query(
            r#"
            INSERT INTO builds (
                id, pipeline_id, project_id, name, stage, stage_idx, ref, tag,
                commands, tag_list, variables, options, trigger_request_id,
                user_id, status, position, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(build.id)
        .bind(build.pipeline_id)
        .bind(build.project_id)
        .bind(&build.name)
        .bind(&build.stage)
        .bind(build.stage_idx)
        .bind(&build.ref_name)
        .bind(build.tag)
        .bind(&build.commands)
        .bind(&build.tag_list)
        .bind(Json(&build.variables))
        .bind(Json(&build.options))
        .bind(build.trigger_request_id)
        .bind(build.user_id)
        .bind(status_to_string(build.status))
        .bind(position as i32)
        .bind(build.created_at)
        .execute(&mut *tx)
        .await?;

        created.push(build);
    }

    tx.commit().await?;

    Ok(created)
}

/// Find builds of a pipeline in creation order
pub async fn find_by_pipeline(pool: &PgPool, pipeline_id: Uuid) -> Result<Vec<Build>, sqlx::Error> {
    let rows = sqlx::query_as::<_, BuildRow>(
        r#"
        SELECT id, pipeline_id, project_id, name, stage, stage_idx, ref, tag,
               commands, tag_list, variables, options, trigger_request_id,
               user_id, status, created_at
        FROM builds
        WHERE pipeline_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(pipeline_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Port Adapter
// =============================================================================

/// [`BuildRepository`] on top of the builds table
#[derive(Clone)]
pub struct PgBuildRepository {
    pool: PgPool,
}

impl PgBuildRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BuildRepository for PgBuildRepository {
    async fn bulk_insert(&self, builds: Vec<NewBuild>) -> Result<Vec<Build>, StoreError> {
        bulk_insert(&self.pool, builds)
            .await
            .map_err(StoreError::backend)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn status_to_string(status: BuildStatus) -> &'static str {
    match status {
        BuildStatus::Created => "created",
    }
}

fn string_to_status(_s: &str) -> BuildStatus {
    BuildStatus::Created
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct BuildRow {
    id: Uuid,
    pipeline_id: Uuid,
    project_id: Uuid,
    name: String,
    stage: String,
    stage_idx: i32,
    #[sqlx(rename = "ref")]
    ref_name: String,
    tag: bool,
    commands: String,
    tag_list: Vec<String>,
    variables: serde_json::Value,
    options: serde_json::Value,
    trigger_request_id: Option<Uuid>,
    user_id: Uuid,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<BuildRow> for Build {
    fn from(row: BuildRow) -> Self {
        let variables = serde_json::from_value(row.variables).unwrap_or_default();
        let options = serde_json::from_value(row.options).unwrap_or_default();

        Build {
            id: row.id,
            pipeline_id: row.pipeline_id,
            project_id: row.project_id,
            name: row.name,
            stage: row.stage,
            stage_idx: row.stage_idx,
            ref_name: row.ref_name,
            tag: row.tag,
            commands: row.commands,
            tag_list: row.tag_list,
            variables,
            options,
            trigger_request_id: row.trigger_request_id,
            user_id: row.user_id,
            status: string_to_status(&row.status),
            created_at: row.created_at,
        }
    }
}
