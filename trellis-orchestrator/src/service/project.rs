//! Project Service
//!
//! Project registration and membership management.

use sqlx::PgPool;
use trellis_core::domain::project::Project;
use trellis_core::dto::project::{AddMember, CreateProject};
use uuid::Uuid;

use crate::repository::project_repository;

/// Service error type
#[derive(Debug)]
pub enum ProjectError {
    NotFound(Uuid),
    ValidationError(String),
    Conflict(String),
    DatabaseError(sqlx::Error),
}

impl From<sqlx::Error> for ProjectError {
    fn from(err: sqlx::Error) -> Self {
        ProjectError::DatabaseError(err)
    }
}

pub type Result<T> = std::result::Result<T, ProjectError>;

/// Register a new project
pub async fn create_project(pool: &PgPool, req: CreateProject) -> Result<Project> {
    validate_project_request(&req)?;

    let path = req.path_with_namespace.clone();
    let project = project_repository::create(pool, req)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                ProjectError::Conflict(format!("Project {} already exists", path))
            }
            other => ProjectError::DatabaseError(other),
        })?;

    tracing::info!(
        "Project created: {} ({})",
        project.path_with_namespace,
        project.id
    );

    Ok(project)
}

/// Get a project by ID
pub async fn get_project(pool: &PgPool, id: Uuid) -> Result<Project> {
    let project = project_repository::find_by_id(pool, id)
        .await?
        .ok_or(ProjectError::NotFound(id))?;

    Ok(project)
}

/// Add a member to a project, or update their access level
pub async fn add_member(pool: &PgPool, project_id: Uuid, req: AddMember) -> Result<()> {
    if req.username.trim().is_empty() {
        return Err(ProjectError::ValidationError(
            "Username cannot be empty".to_string(),
        ));
    }

    let project = get_project(pool, project_id).await?;
    project_repository::upsert_member(pool, project_id, &req).await?;

    tracing::info!(
        "Member {} added to {} with access level {:?}",
        req.username,
        project.path_with_namespace,
        req.access_level
    );

    Ok(())
}

// =============================================================================
// Validation
// =============================================================================

fn validate_project_request(req: &CreateProject) -> Result<()> {
    let path = req.path_with_namespace.trim();

    if path.is_empty() {
        return Err(ProjectError::ValidationError(
            "Project path cannot be empty".to_string(),
        ));
    }

    if path.len() > 255 {
        return Err(ProjectError::ValidationError(
            "Project path is too long (max 255 characters)".to_string(),
        ));
    }

    if req.repository_path.trim().is_empty() {
        return Err(ProjectError::ValidationError(
            "Repository path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str, repository_path: &str) -> CreateProject {
        CreateProject {
            path_with_namespace: path.to_string(),
            repository_path: repository_path.to_string(),
            builds_enabled: true,
        }
    }

    #[test]
    fn test_validate_empty_path() {
        let result = validate_project_request(&request("", "/srv/git/a.git"));
        assert!(matches!(result, Err(ProjectError::ValidationError(_))));
    }

    #[test]
    fn test_validate_empty_repository() {
        let result = validate_project_request(&request("acme/widgets", " "));
        assert!(matches!(result, Err(ProjectError::ValidationError(_))));
    }

    #[test]
    fn test_validate_valid_request() {
        assert!(validate_project_request(&request("acme/widgets", "/srv/git/a.git")).is_ok());
    }
}
