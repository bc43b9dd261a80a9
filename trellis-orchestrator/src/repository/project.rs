//! Project Repository
//!
//! Projects, users and project membership.

use async_trait::async_trait;
use sqlx::PgPool;
use trellis_core::StoreError;
use trellis_core::domain::project::{Ability, Project, User};
use trellis_core::dto::project::{AccessLevel, AddMember, CreateProject};
use trellis_core::ports::AuthzService;
use uuid::Uuid;

/// Create a new project in the database
pub async fn create(pool: &PgPool, req: CreateProject) -> Result<Project, sqlx::Error> {
    let project = Project {
        id: Uuid::new_v4(),
        path_with_namespace: req.path_with_namespace,
        repository_path: req.repository_path,
        builds_enabled: req.builds_enabled,
        created_at: chrono::Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO projects (id, path_with_namespace, repository_path, builds_enabled, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(project.id)
    .bind(&project.path_with_namespace)
    .bind(&project.repository_path)
    .bind(project.builds_enabled)
    .bind(project.created_at)
    .execute(pool)
    .await?;

    Ok(project)
}

/// Find a project by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Project>, sqlx::Error> {
    let row = sqlx::query_as::<_, ProjectRow>(
        r#"
        SELECT id, path_with_namespace, repository_path, builds_enabled, created_at
        FROM projects
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Find a user by ID
pub async fn find_user(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query_as::<_, UserRow>("SELECT id, username FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.into()))
}

/// Add a user to a project, or change their access level
///
/// The user row is created on first use.
pub async fn upsert_member(
    pool: &PgPool,
    project_id: Uuid,
    req: &AddMember,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO users (id, username)
        VALUES ($1, $2)
        ON CONFLICT (id) DO UPDATE SET username = EXCLUDED.username
        "#,
    )
    .bind(req.user_id)
    .bind(&req.username)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO project_members (project_id, user_id, access_level)
        VALUES ($1, $2, $3)
        ON CONFLICT (project_id, user_id) DO UPDATE SET access_level = EXCLUDED.access_level
        "#,
    )
    .bind(project_id)
    .bind(req.user_id)
    .bind(req.access_level.level())
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}

/// Access level of a user on a project, if they are a member
pub async fn access_level(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        "SELECT access_level FROM project_members WHERE project_id = $1 AND user_id = $2",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

// =============================================================================
// Port Adapter
// =============================================================================

/// [`AuthzService`] backed by project membership
#[derive(Clone)]
pub struct MembershipAuthz {
    pool: PgPool,
}

impl MembershipAuthz {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Minimum access level granting an ability
fn required_level(ability: Ability) -> i32 {
    match ability {
        Ability::CreatePipeline => AccessLevel::Developer.level(),
    }
}

#[async_trait]
impl AuthzService for MembershipAuthz {
    async fn can(
        &self,
        user: &User,
        ability: Ability,
        project: &Project,
    ) -> Result<bool, StoreError> {
        let level = access_level(&self.pool, project.id, user.id)
            .await
            .map_err(StoreError::backend)?;

        let allowed = level.is_some_and(|level| level >= required_level(ability));
        tracing::debug!(
            "{} {} {} on {}",
            user.username,
            if allowed { "may" } else { "may not" },
            ability,
            project.path_with_namespace
        );

        Ok(allowed)
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    path_with_namespace: String,
    repository_path: String,
    builds_enabled: bool,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Project {
            id: row.id,
            path_with_namespace: row.path_with_namespace,
            repository_path: row.repository_path,
            builds_enabled: row.builds_enabled,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_pipeline_requires_developer() {
        let required = required_level(Ability::CreatePipeline);
        assert_eq!(required, 30);
        assert!(AccessLevel::Reporter.level() < required);
        assert!(AccessLevel::Maintainer.level() >= required);
    }
}
