//! Reference Resolver
//!
//! Maps the ref of a creation request to a short ref name, a tag/branch
//! classification and a concrete commit.

use crate::domain::commit::Commit;
use crate::domain::pipeline::BLANK_SHA;
use crate::domain::project::Project;
use crate::dto::pipeline::CreatePipeline;
use crate::error::PipelineError;
use crate::ports::{CommitStore, RefStore};

const BRANCH_REF_PREFIX: &str = "refs/heads/";
const TAG_REF_PREFIX: &str = "refs/tags/";

/// A ref as given by the caller, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSpec {
    /// Ref exactly as requested
    pub raw: String,
    /// Short branch or tag name
    pub name: String,
    pub tag: bool,
}

impl RefSpec {
    /// Classify a ref string. Pure, no repository access.
    ///
    /// Only a `refs/tags/` prefix marks a tag; a bare tag name is
    /// indistinguishable from a branch name here.
    pub fn parse(raw: &str) -> Self {
        let name = raw
            .strip_prefix(BRANCH_REF_PREFIX)
            .or_else(|| raw.strip_prefix(TAG_REF_PREFIX))
            .unwrap_or(raw);

        Self {
            raw: raw.to_string(),
            name: name.to_string(),
            tag: raw.starts_with(TAG_REF_PREFIX),
        }
    }
}

/// Commit to build: `checkout_sha`, then `after`, if either is given
pub fn override_sha(params: &CreatePipeline) -> Option<&str> {
    non_empty(params.checkout_sha.as_deref()).or_else(|| non_empty(params.after.as_deref()))
}

/// Prior commit: `checkout_sha`, then `before`, then the blank sentinel
pub fn before_sha(params: &CreatePipeline) -> String {
    non_empty(params.checkout_sha.as_deref())
        .or_else(|| non_empty(params.before.as_deref()))
        .unwrap_or(BLANK_SHA)
        .to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Ref and commit lookups against the project repository
pub struct ReferenceResolver<'a> {
    refs: &'a dyn RefStore,
    commits: &'a dyn CommitStore,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(refs: &'a dyn RefStore, commits: &'a dyn CommitStore) -> Self {
        Self { refs, commits }
    }

    /// Fails with `ReferenceNotFound` unless the short ref name exists
    pub async fn ensure_ref_exists(
        &self,
        project: &Project,
        reference: &RefSpec,
    ) -> Result<(), PipelineError> {
        let names = self.refs.ref_names(project).await.map_err(|e| {
            tracing::error!(
                "Failed to list refs of {}: {}",
                project.path_with_namespace,
                e
            );
            PipelineError::RepositoryUnavailable
        })?;

        if names.contains(&reference.name) {
            Ok(())
        } else {
            Err(PipelineError::ReferenceNotFound)
        }
    }

    /// Resolve the override commit, or the raw ref head when none is given
    pub async fn resolve_commit(
        &self,
        project: &Project,
        reference: &RefSpec,
        params: &CreatePipeline,
    ) -> Result<Commit, PipelineError> {
        let target = override_sha(params).unwrap_or(&reference.raw);

        self.commits
            .find_commit(project, target)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to resolve commit {} in {}: {}",
                    target,
                    project.path_with_namespace,
                    e
                );
                PipelineError::RepositoryUnavailable
            })?
            .ok_or(PipelineError::CommitNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeRepository, project};

    #[test]
    fn test_parse_branch_ref() {
        let spec = RefSpec::parse("refs/heads/feature/login");
        assert_eq!(spec.name, "feature/login");
        assert!(!spec.tag);
    }

    #[test]
    fn test_parse_tag_ref() {
        let spec = RefSpec::parse("refs/tags/v1.2.0");
        assert_eq!(spec.name, "v1.2.0");
        assert!(spec.tag);
    }

    #[test]
    fn test_parse_short_name_is_branch() {
        let spec = RefSpec::parse("v1.2.0");
        assert_eq!(spec.name, "v1.2.0");
        assert!(!spec.tag);
    }

    #[test]
    fn test_before_sha_defaults_to_blank() {
        let params = CreatePipeline::new("main");
        assert_eq!(before_sha(&params), BLANK_SHA);

        let params = CreatePipeline {
            before: Some(String::new()),
            ..CreatePipeline::new("main")
        };
        assert_eq!(before_sha(&params), BLANK_SHA);
    }

    #[test]
    fn test_checkout_sha_wins() {
        let params = CreatePipeline {
            after: Some("aaa".to_string()),
            before: Some("bbb".to_string()),
            checkout_sha: Some("ccc".to_string()),
            ..CreatePipeline::new("main")
        };
        assert_eq!(override_sha(&params), Some("ccc"));
        assert_eq!(before_sha(&params), "ccc");

        let params = CreatePipeline {
            after: Some("aaa".to_string()),
            before: Some("bbb".to_string()),
            ..CreatePipeline::new("main")
        };
        assert_eq!(override_sha(&params), Some("aaa"));
        assert_eq!(before_sha(&params), "bbb");
    }

    #[tokio::test]
    async fn test_resolve_commit_prefers_override() {
        let repo = FakeRepository::new()
            .with_branch("main", "deadbeef")
            .with_commit("cafebabe");
        let resolver = ReferenceResolver::new(&repo, &repo);
        let project = project();
        let reference = RefSpec::parse("main");

        let head = resolver
            .resolve_commit(&project, &reference, &CreatePipeline::new("main"))
            .await
            .unwrap();
        assert_eq!(head.id, "deadbeef");

        let params = CreatePipeline {
            after: Some("cafebabe".to_string()),
            ..CreatePipeline::new("main")
        };
        let pinned = resolver
            .resolve_commit(&project, &reference, &params)
            .await
            .unwrap();
        assert_eq!(pinned.id, "cafebabe");
    }

    #[tokio::test]
    async fn test_missing_ref_and_commit() {
        let repo = FakeRepository::new().with_branch("main", "deadbeef");
        let resolver = ReferenceResolver::new(&repo, &repo);
        let project = project();

        let err = resolver
            .ensure_ref_exists(&project, &RefSpec::parse("develop"))
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::ReferenceNotFound);

        let params = CreatePipeline {
            after: Some("0123456".to_string()),
            ..CreatePipeline::new("main")
        };
        let err = resolver
            .resolve_commit(&project, &RefSpec::parse("main"), &params)
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::CommitNotFound);
    }

    #[tokio::test]
    async fn test_store_failure_is_unavailable() {
        let repo = FakeRepository::new()
            .with_branch("main", "deadbeef")
            .unavailable();
        let resolver = ReferenceResolver::new(&repo, &repo);

        let err = resolver
            .ensure_ref_exists(&project(), &RefSpec::parse("main"))
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::RepositoryUnavailable);
    }
}
