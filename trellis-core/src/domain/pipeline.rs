//! Pipeline domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Commit id meaning "no prior commit"
pub const BLANK_SHA: &str = "0000000000000000000000000000000000000000";

/// A pipeline constructed for one ref and commit
///
/// Built in memory before any gate is evaluated. `id` stays `None` until the
/// pipeline is inserted by the pipeline repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Option<Uuid>,
    pub project_id: Uuid,
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: Option<String>,
    pub before_sha: String,
    pub tag: bool,
    pub yaml_errors: Option<String>,
    pub status: PipelineStatus,
    pub created_at: DateTime<Utc>,
}

impl Pipeline {
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// Pipeline lifecycle status
///
/// Only the states this system moves a pipeline through; execution states
/// belong to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Constructed or inserted, not yet handed to the scheduler
    Created,
    /// Builds persisted and ready to be processed
    Pending,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStatus::Created => write!(f, "created"),
            PipelineStatus::Pending => write!(f, "pending"),
        }
    }
}
