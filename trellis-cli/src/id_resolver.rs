//! ID resolver module
//!
//! Handles resolution of UUID prefixes to full UUIDs by querying the API.
//! This allows users to specify short, unambiguous prefixes instead of full UUIDs.

use anyhow::{Context, Result, anyhow};
use uuid::Uuid;

use crate::api::ApiClient;
use crate::types::IdOrPrefix;

/// Resolve a pipeline ID or prefix to a full UUID
///
/// A full UUID is returned as is. A prefix is matched against the pipelines
/// of `project`, which is then required.
///
/// # Errors
/// Returns an error if:
/// - A prefix is given without a project
/// - No pipeline matches the prefix
/// - Multiple pipelines match the prefix (ambiguous)
/// - API call fails
pub async fn resolve_pipeline_id(
    client: &ApiClient,
    project: Option<Uuid>,
    id_or_prefix: &IdOrPrefix,
) -> Result<Uuid> {
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let project = project.ok_or_else(|| {
        anyhow!(
            "Resolving the pipeline prefix '{}' requires --project",
            id_or_prefix
        )
    })?;

    let pipelines = client
        .list_pipelines(project)
        .await
        .context("Failed to fetch pipelines for ID resolution")?;

    let candidates: Vec<Uuid> = pipelines.iter().filter_map(|p| p.id).collect();
    match_prefix(&id_or_prefix.as_str(), &candidates)
}

/// Pick the single candidate starting with `prefix`
fn match_prefix(prefix: &str, candidates: &[Uuid]) -> Result<Uuid> {
    let matches: Vec<&Uuid> = candidates
        .iter()
        .filter(|id| id.to_string().starts_with(prefix))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!(
            "No pipeline found with ID starting with '{}'",
            prefix
        )),
        [only] => Ok(**only),
        _ => {
            let ids: Vec<String> = matches.iter().map(|id| id.to_string()).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple pipelines: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<Uuid> {
        [
            "1a2b3c4d-0000-4000-8000-000000000001",
            "1a2b9999-0000-4000-8000-000000000002",
            "ffee0000-0000-4000-8000-000000000003",
        ]
        .iter()
        .map(|s| Uuid::parse_str(s).unwrap())
        .collect()
    }

    #[test]
    fn test_unique_prefix() {
        let ids = ids();
        assert_eq!(match_prefix("ffee", &ids).unwrap(), ids[2]);
        assert_eq!(match_prefix("1a2b3", &ids).unwrap(), ids[0]);
    }

    #[test]
    fn test_ambiguous_prefix() {
        let err = match_prefix("1a2b", &ids()).unwrap_err();
        assert!(err.to_string().starts_with("Ambiguous prefix '1a2b'"));
    }

    #[test]
    fn test_unknown_prefix() {
        let err = match_prefix("0000", &ids()).unwrap_err();
        assert!(err.to_string().starts_with("No pipeline found"));
    }
}
