//! Error types
//!
//! `PipelineError` is the rejection taxonomy of pipeline construction. It is
//! data attached to a rejected outcome, never propagated as a fault.
//! `StoreError` and `ParseError` are what the ports return.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message reported for any internal configuration parser failure
pub const UNDEFINED_ERROR: &str = "Undefined error";

/// Reason a pipeline was not assembled
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum PipelineError {
    #[error("Pipeline is disabled")]
    FeatureDisabled,

    #[error("Insufficient permissions to create a new pipeline")]
    Unauthorized,

    #[error("Reference not found")]
    ReferenceNotFound,

    #[error("Commit not found")]
    CommitNotFound,

    #[error("Creation of pipeline is skipped")]
    SkippedByDirective,

    #[error("Missing configuration file")]
    ConfigurationMissing,

    #[error("{0}")]
    ConfigurationInvalid(String),

    #[error("Undefined error")]
    ConfigurationInternalError,

    #[error("No builds for this pipeline.")]
    NoExecutableJobs,

    #[error("Pipeline creation was cancelled")]
    Cancelled,

    #[error("Repository is unavailable")]
    RepositoryUnavailable,

    #[error("Failed to persist pipeline")]
    PersistenceFailed,
}

impl PipelineError {
    /// Whether this rejection came from the configuration gate
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            PipelineError::ConfigurationMissing
                | PipelineError::ConfigurationInvalid(_)
                | PipelineError::ConfigurationInternalError
        )
    }
}

/// Failure of a storage or repository backend behind a port
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend (database, object store) reported an error
    #[error("storage backend failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An external command (e.g. git) failed
    #[error("command failed: {0}")]
    Command(String),

    /// A row or object referenced by the caller does not exist
    #[error("not found: {0}")]
    NotFound(String),
}

impl StoreError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(err))
    }
}

/// Failure reported by a configuration parser
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The document is malformed or semantically invalid
    #[error("{0}")]
    Validation(String),

    /// The parser itself failed; the detail is never shown to callers
    #[error("internal parser error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_messages() {
        assert_eq!(PipelineError::FeatureDisabled.to_string(), "Pipeline is disabled");
        assert_eq!(
            PipelineError::Unauthorized.to_string(),
            "Insufficient permissions to create a new pipeline"
        );
        assert_eq!(
            PipelineError::ConfigurationMissing.to_string(),
            "Missing configuration file"
        );
        assert_eq!(
            PipelineError::ConfigurationInvalid("jobs: must be a table".to_string()).to_string(),
            "jobs: must be a table"
        );
        assert_eq!(
            PipelineError::ConfigurationInternalError.to_string(),
            UNDEFINED_ERROR
        );
        assert_eq!(
            PipelineError::NoExecutableJobs.to_string(),
            "No builds for this pipeline."
        );
    }

    #[test]
    fn test_configuration_error_classification() {
        assert!(PipelineError::ConfigurationMissing.is_configuration_error());
        assert!(PipelineError::ConfigurationInternalError.is_configuration_error());
        assert!(!PipelineError::CommitNotFound.is_configuration_error());
    }
}
