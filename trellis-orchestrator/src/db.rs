use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create projects table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id UUID PRIMARY KEY,
            path_with_namespace VARCHAR(255) NOT NULL UNIQUE,
            repository_path TEXT NOT NULL,
            builds_enabled BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create users table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            username VARCHAR(255) NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create project members table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_members (
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            access_level INTEGER NOT NULL,
            PRIMARY KEY (project_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create pipelines table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipelines (
            id UUID PRIMARY KEY,
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            ref VARCHAR(255) NOT NULL,
            sha VARCHAR(64),
            before_sha VARCHAR(64) NOT NULL,
            tag BOOLEAN NOT NULL DEFAULT FALSE,
            yaml_errors TEXT,
            status VARCHAR(50) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create builds table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS builds (
            id UUID PRIMARY KEY,
            pipeline_id UUID NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
            project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            name VARCHAR(255) NOT NULL,
            stage VARCHAR(255) NOT NULL,
            stage_idx INTEGER NOT NULL,
            ref VARCHAR(255) NOT NULL,
            tag BOOLEAN NOT NULL DEFAULT FALSE,
            commands TEXT NOT NULL,
            tag_list TEXT[] NOT NULL DEFAULT '{}',
            variables JSONB NOT NULL DEFAULT '{}',
            options JSONB NOT NULL DEFAULT '{}',
            trigger_request_id UUID,
            user_id UUID NOT NULL,
            status VARCHAR(50) NOT NULL,
            position INTEGER NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pipelines_project_id ON pipelines(project_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_pipelines_status ON pipelines(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_builds_pipeline_id ON builds(pipeline_id, position)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
