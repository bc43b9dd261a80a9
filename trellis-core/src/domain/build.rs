//! Build domain types
//!
//! A build is one executable job of a pipeline, derived from a job
//! specification of the configuration document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::config::When;

/// Persisted build record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub stage: String,
    pub stage_idx: i32,
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub tag: bool,
    pub commands: String,
    pub tag_list: Vec<String>,
    pub variables: HashMap<String, String>,
    pub options: BuildOptions,
    pub trigger_request_id: Option<Uuid>,
    pub user_id: Uuid,
    pub status: BuildStatus,
    pub created_at: DateTime<Utc>,
}

/// Build attributes handed to the build repository for bulk insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBuild {
    pub pipeline_id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub stage: String,
    pub stage_idx: i32,
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub tag: bool,
    pub commands: String,
    pub tag_list: Vec<String>,
    pub variables: HashMap<String, String>,
    pub options: BuildOptions,
    pub trigger_request_id: Option<Uuid>,
    pub user_id: Uuid,
}

impl NewBuild {
    /// Materialize the persisted record once the repository assigned an id
    pub fn into_build(self, id: Uuid, created_at: DateTime<Utc>) -> Build {
        Build {
            id,
            pipeline_id: self.pipeline_id,
            project_id: self.project_id,
            name: self.name,
            stage: self.stage,
            stage_idx: self.stage_idx,
            ref_name: self.ref_name,
            tag: self.tag,
            commands: self.commands,
            tag_list: self.tag_list,
            variables: self.variables,
            options: self.options,
            trigger_request_id: self.trigger_request_id,
            user_id: self.user_id,
            status: BuildStatus::Created,
            created_at,
        }
    }
}

/// Executor options carried opaquely to the runner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildOptions {
    pub image: Option<String>,
    pub allow_failure: bool,
    pub when: When,
}

/// Build status
///
/// Builds are always created in `Created`; transitions belong to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Created,
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStatus::Created => write!(f, "created"),
        }
    }
}
