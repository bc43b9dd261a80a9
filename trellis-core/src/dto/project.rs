//! Project DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to register a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub path_with_namespace: String,
    pub repository_path: String,
    #[serde(default = "default_builds_enabled")]
    pub builds_enabled: bool,
}

fn default_builds_enabled() -> bool {
    true
}

/// Request to grant a user access to a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMember {
    pub user_id: Uuid,
    pub username: String,
    pub access_level: AccessLevel,
}

/// Project membership level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Guest,
    Reporter,
    Developer,
    Maintainer,
}

impl AccessLevel {
    /// Numeric level stored in `project_members.access_level`
    pub fn level(&self) -> i32 {
        match self {
            AccessLevel::Guest => 10,
            AccessLevel::Reporter => 20,
            AccessLevel::Developer => 30,
            AccessLevel::Maintainer => 40,
        }
    }
}
