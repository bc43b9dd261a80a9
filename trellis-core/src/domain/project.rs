//! Project and principal domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A project owning a repository and its pipelines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,

    /// Namespaced path, e.g. `group/service`
    pub path_with_namespace: String,

    /// Location of the bare or working git repository on disk
    pub repository_path: String,

    /// Whether CI builds are enabled for this project
    pub builds_enabled: bool,

    pub created_at: DateTime<Utc>,
}

/// The acting principal of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

/// Capabilities checked against the authorization service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ability {
    CreatePipeline,
}

impl std::fmt::Display for Ability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ability::CreatePipeline => write!(f, "create_pipeline"),
        }
    }
}
