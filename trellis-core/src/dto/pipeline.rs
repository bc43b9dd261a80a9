//! Pipeline DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parameters of a pipeline creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipeline {
    /// Symbolic ref to build: a branch or tag name, or a full `refs/...` path
    #[serde(rename = "ref")]
    pub ref_name: String,

    /// Commit to build instead of the ref head
    #[serde(default)]
    pub after: Option<String>,

    /// Prior commit of the push
    #[serde(default)]
    pub before: Option<String>,

    /// Explicit checkout commit; takes precedence over `after` and `before`
    #[serde(default)]
    pub checkout_sha: Option<String>,

    /// Honor the configuration's skip directive
    #[serde(default = "default_true")]
    pub honor_skip_directive: bool,

    /// Persist the pipeline when the configuration is missing or invalid
    #[serde(default = "default_true")]
    pub persist_on_config_error: bool,

    /// Trigger request the builds are attached to
    #[serde(default)]
    pub trigger_request_id: Option<Uuid>,
}

impl CreatePipeline {
    pub fn new(ref_name: impl Into<String>) -> Self {
        Self {
            ref_name: ref_name.into(),
            after: None,
            before: None,
            checkout_sha: None,
            honor_skip_directive: true,
            persist_on_config_error: true,
            trigger_request_id: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// HTTP request body for `POST /pipeline/create`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipelineRequest {
    pub project_id: Uuid,
    pub user_id: Uuid,
    #[serde(flatten)]
    pub params: CreatePipeline,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let body = serde_json::json!({
            "project_id": Uuid::nil(),
            "user_id": Uuid::nil(),
            "ref": "main",
        });

        let req: CreatePipelineRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.params.ref_name, "main");
        assert!(req.params.honor_skip_directive);
        assert!(req.params.persist_on_config_error);
        assert!(req.params.after.is_none());
        assert!(req.params.trigger_request_id.is_none());
    }

    #[test]
    fn test_request_overrides() {
        let body = serde_json::json!({
            "project_id": Uuid::nil(),
            "user_id": Uuid::nil(),
            "ref": "refs/tags/v1.0",
            "after": "deadbeef",
            "honor_skip_directive": false,
            "persist_on_config_error": false,
        });

        let req: CreatePipelineRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.params.after.as_deref(), Some("deadbeef"));
        assert!(!req.params.honor_skip_directive);
        assert!(!req.params.persist_on_config_error);
    }
}
