//! Git-backed repository access
//!
//! Ref listing, commit lookup and configuration file reads run the git
//! executable against the project's `repository_path`. Bare and non-bare
//! repositories both work.

use async_trait::async_trait;
use std::collections::HashSet;
use std::process::Output;
use tokio::process::Command;
use trellis_core::StoreError;
use trellis_core::domain::commit::Commit;
use trellis_core::domain::project::Project;
use trellis_core::ports::{CommitStore, ConfigStore, RefStore};

const BRANCH_REF_PREFIX: &str = "refs/heads/";
const TAG_REF_PREFIX: &str = "refs/tags/";

/// Reads refs, commits and configuration files through git
#[derive(Debug, Clone)]
pub struct GitRepository {
    binary: String,
    config_file_name: String,
}

impl GitRepository {
    pub fn new(binary: impl Into<String>, config_file_name: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            config_file_name: config_file_name.into(),
        }
    }

    async fn git(&self, project: &Project, args: &[&str]) -> Result<Output, StoreError> {
        Command::new(&self.binary)
            .arg("-C")
            .arg(&project.repository_path)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| StoreError::Command(format!("failed to run {}: {}", self.binary, e)))
    }

    /// Run git and return stdout, failing on a non-zero exit
    async fn git_stdout(&self, project: &Project, args: &[&str]) -> Result<String, StoreError> {
        let output = self.git(project, args).await?;

        if !output.status.success() {
            return Err(command_failed(args, &output));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn command_failed(args: &[&str], output: &Output) -> StoreError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    StoreError::Command(format!(
        "git {} failed: {}",
        args.first().copied().unwrap_or_default(),
        stderr.trim()
    ))
}

/// Short names of branch and tag refs in `for-each-ref` output
fn short_ref_names(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .filter_map(|line| {
            line.strip_prefix(BRANCH_REF_PREFIX)
                .or_else(|| line.strip_prefix(TAG_REF_PREFIX))
        })
        .map(|name| name.to_string())
        .collect()
}

#[async_trait]
impl RefStore for GitRepository {
    async fn ref_names(&self, project: &Project) -> Result<HashSet<String>, StoreError> {
        let listing = self
            .git_stdout(
                project,
                &["for-each-ref", "--format=%(refname)", "refs/heads", "refs/tags"],
            )
            .await?;

        Ok(short_ref_names(&listing))
    }
}

#[async_trait]
impl CommitStore for GitRepository {
    async fn find_commit(
        &self,
        project: &Project,
        ref_or_sha: &str,
    ) -> Result<Option<Commit>, StoreError> {
        // Never let a caller-supplied value be read as an option
        if ref_or_sha.is_empty() || ref_or_sha.starts_with('-') {
            return Ok(None);
        }

        let target = format!("{}^{{commit}}", ref_or_sha);
        let args = ["rev-parse", "--verify", "--quiet", target.as_str()];
        let output = self.git(project, &args).await?;

        // --quiet exits 1 without output for an unknown object
        match output.status.code() {
            Some(0) => {
                let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Ok(Some(Commit::new(sha)))
            }
            Some(1) => Ok(None),
            _ => Err(command_failed(&args, &output)),
        }
    }
}

#[async_trait]
impl ConfigStore for GitRepository {
    async fn fetch_document(
        &self,
        project: &Project,
        commit: &Commit,
    ) -> Result<Option<String>, StoreError> {
        let listing = self
            .git_stdout(
                project,
                &["ls-tree", "--name-only", &commit.id, "--", &self.config_file_name],
            )
            .await?;

        if listing.trim().is_empty() {
            tracing::debug!(
                "No {} in {}@{}",
                self.config_file_name,
                project.path_with_namespace,
                commit.id
            );
            return Ok(None);
        }

        let object = format!("{}:{}", commit.id, self.config_file_name);
        let content = self
            .git_stdout(project, &["cat-file", "blob", &object])
            .await?;

        Ok(Some(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::process::Command as StdCommand;
    use uuid::Uuid;

    fn run_git(repo_dir: &Path, args: &[&str]) -> String {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Repository with one commit carrying a configuration file on `main`
    /// and a `v1.0` tag
    fn make_git_repo() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        std::fs::write(dir.path().join(".trellis.lua"), "return { jobs = {} }\n").unwrap();
        run_git(dir.path(), &["add", ".trellis.lua"]);
        run_git(dir.path(), &["commit", "-m", "initial"]);
        run_git(dir.path(), &["branch", "-M", "main"]);
        run_git(dir.path(), &["tag", "v1.0"]);
        let sha = run_git(dir.path(), &["rev-parse", "HEAD"]);
        (dir, sha)
    }

    fn project(path: &Path) -> Project {
        Project {
            id: Uuid::new_v4(),
            path_with_namespace: "acme/widgets".to_string(),
            repository_path: path.to_string_lossy().into_owned(),
            builds_enabled: true,
            created_at: chrono::Utc::now(),
        }
    }

    fn git() -> GitRepository {
        GitRepository::new("git", ".trellis.lua")
    }

    #[test]
    fn test_short_ref_names() {
        let names = short_ref_names("refs/heads/main\nrefs/heads/feature/x\nrefs/tags/v1.0\n");
        assert_eq!(names.len(), 3);
        assert!(names.contains("feature/x"));
        assert!(names.contains("v1.0"));
    }

    #[tokio::test]
    async fn test_lists_branches_and_tags() {
        let (dir, _) = make_git_repo();
        let names = git().ref_names(&project(dir.path())).await.unwrap();

        assert!(names.contains("main"));
        assert!(names.contains("v1.0"));
    }

    #[tokio::test]
    async fn test_find_commit() {
        let (dir, sha) = make_git_repo();
        let project = project(dir.path());

        for target in ["main", "refs/heads/main", "refs/tags/v1.0", sha.as_str()] {
            let commit = git().find_commit(&project, target).await.unwrap();
            assert_eq!(commit, Some(Commit::new(sha.clone())), "target {}", target);
        }

        assert_eq!(git().find_commit(&project, "nope").await.unwrap(), None);
        assert_eq!(
            git().find_commit(&project, "--output=/tmp/x").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_fetch_document() {
        let (dir, sha) = make_git_repo();
        let project = project(dir.path());
        let commit = Commit::new(sha);

        let content = git().fetch_document(&project, &commit).await.unwrap();
        assert_eq!(content.as_deref(), Some("return { jobs = {} }\n"));

        let other = GitRepository::new("git", "ci/other.lua");
        assert_eq!(other.fetch_document(&project, &commit).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_repository_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let project = project(&dir.path().join("missing"));

        assert!(git().ref_names(&project).await.is_err());
        assert!(git().find_commit(&project, "main").await.is_err());
    }
}
