//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::{pipeline_service, project_service};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    DatabaseError(sqlx::Error),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<pipeline_service::PipelineError> for ApiError {
    fn from(err: pipeline_service::PipelineError) -> Self {
        match err {
            pipeline_service::PipelineError::NotFound(msg) => ApiError::NotFound(msg),
            pipeline_service::PipelineError::ValidationError(msg) => ApiError::BadRequest(msg),
            pipeline_service::PipelineError::DatabaseError(err) => ApiError::DatabaseError(err),
            pipeline_service::PipelineError::InternalError(msg) => ApiError::InternalError(msg),
        }
    }
}

impl From<project_service::ProjectError> for ApiError {
    fn from(err: project_service::ProjectError) -> Self {
        match err {
            project_service::ProjectError::NotFound(id) => {
                ApiError::NotFound(format!("Project {} not found", id))
            }
            project_service::ProjectError::ValidationError(msg) => ApiError::BadRequest(msg),
            project_service::ProjectError::Conflict(msg) => ApiError::Conflict(msg),
            project_service::ProjectError::DatabaseError(err) => ApiError::DatabaseError(err),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
