//! Error/Result Reporter
//!
//! The value returned by pipeline construction. A rejection carries the
//! pipeline as it stood when the failing gate ran, together with the reasons.

use serde::{Deserialize, Serialize};

use crate::domain::build::Build;
use crate::domain::pipeline::Pipeline;
use crate::error::PipelineError;

/// Outcome of one pipeline creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PipelineOutcome {
    /// Pipeline persisted with at least one build and handed to the scheduler
    Assembled {
        pipeline: Pipeline,
        builds: Vec<Build>,
    },
    /// A gate failed. The pipeline has an id only when the configuration gate
    /// persisted it.
    Rejected {
        pipeline: Pipeline,
        errors: Vec<PipelineError>,
    },
}

impl PipelineOutcome {
    /// Build a rejection and log it
    pub fn rejected(pipeline: Pipeline, error: PipelineError) -> Self {
        tracing::warn!(
            "Pipeline for {} rejected: {} (persisted: {})",
            pipeline.ref_name,
            error,
            pipeline.is_persisted()
        );

        PipelineOutcome::Rejected {
            pipeline,
            errors: vec![error],
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        match self {
            PipelineOutcome::Assembled { pipeline, .. } => pipeline,
            PipelineOutcome::Rejected { pipeline, .. } => pipeline,
        }
    }

    pub fn into_pipeline(self) -> Pipeline {
        match self {
            PipelineOutcome::Assembled { pipeline, .. } => pipeline,
            PipelineOutcome::Rejected { pipeline, .. } => pipeline,
        }
    }

    /// Rejection reasons; empty iff the pipeline was assembled
    pub fn errors(&self) -> &[PipelineError] {
        match self {
            PipelineOutcome::Assembled { .. } => &[],
            PipelineOutcome::Rejected { errors, .. } => errors,
        }
    }

    pub fn builds(&self) -> &[Build] {
        match self {
            PipelineOutcome::Assembled { builds, .. } => builds,
            PipelineOutcome::Rejected { .. } => &[],
        }
    }

    pub fn is_assembled(&self) -> bool {
        self.errors().is_empty()
    }

    /// Human-readable rejection messages
    pub fn messages(&self) -> Vec<String> {
        self.errors().iter().map(|e| e.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pipeline::{BLANK_SHA, PipelineStatus};
    use uuid::Uuid;

    fn pipeline() -> Pipeline {
        Pipeline {
            id: None,
            project_id: Uuid::new_v4(),
            ref_name: "main".to_string(),
            sha: None,
            before_sha: BLANK_SHA.to_string(),
            tag: false,
            yaml_errors: None,
            status: PipelineStatus::Created,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_rejected_outcome() {
        let outcome = PipelineOutcome::rejected(pipeline(), PipelineError::CommitNotFound);

        assert!(!outcome.is_assembled());
        assert_eq!(outcome.messages(), vec!["Commit not found".to_string()]);
        assert!(outcome.builds().is_empty());
        assert!(!outcome.pipeline().is_persisted());
    }

    #[test]
    fn test_serialized_shape() {
        let outcome = PipelineOutcome::rejected(pipeline(), PipelineError::ReferenceNotFound);
        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["outcome"], "rejected");
        assert_eq!(json["pipeline"]["ref"], "main");
        assert_eq!(json["errors"][0]["kind"], "reference_not_found");

        let back: PipelineOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, outcome);
    }
}
