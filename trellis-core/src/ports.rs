//! Ports
//!
//! Seams between the pipeline assembler and the systems it depends on. The
//! orchestrator implements them over git and Postgres; `crate::fakes` holds
//! in-memory versions for tests.

use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use crate::domain::build::{Build, NewBuild};
use crate::domain::commit::Commit;
use crate::domain::config::ConfigDocument;
use crate::domain::pipeline::Pipeline;
use crate::domain::project::{Ability, Project, User};
use crate::error::{ParseError, StoreError};

/// Lists the refs known to a project repository
#[async_trait]
pub trait RefStore: Send + Sync {
    /// Short names of every branch and tag
    async fn ref_names(&self, project: &Project) -> Result<HashSet<String>, StoreError>;
}

/// Resolves refs and object ids to commits
#[async_trait]
pub trait CommitStore: Send + Sync {
    /// Returns `None` when the object does not exist or is not a commit
    async fn find_commit(
        &self,
        project: &Project,
        ref_or_sha: &str,
    ) -> Result<Option<Commit>, StoreError>;
}

/// Fetches the configuration file content at a commit
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Returns `None` when the commit carries no configuration file
    async fn fetch_document(
        &self,
        project: &Project,
        commit: &Commit,
    ) -> Result<Option<String>, StoreError>;
}

/// Turns raw configuration text into a structured document
///
/// Parsing is CPU-only and synchronous.
pub trait ConfigParser: Send + Sync {
    /// `namespace` is the project path, used for diagnostics
    fn parse(&self, raw: &str, namespace: &str) -> Result<ConfigDocument, ParseError>;
}

/// Capability check for an acting principal
#[async_trait]
pub trait AuthzService: Send + Sync {
    async fn can(&self, user: &User, ability: Ability, project: &Project)
    -> Result<bool, StoreError>;
}

/// Pipeline persistence
#[async_trait]
pub trait PipelineRepository: Send + Sync {
    /// Insert a new pipeline, returning its assigned id
    async fn insert(&self, pipeline: &Pipeline) -> Result<Uuid, StoreError>;

    /// Hand the pipeline over to the scheduler (`pending`)
    async fn enqueue(&self, pipeline_id: Uuid) -> Result<(), StoreError>;
}

/// Build persistence
#[async_trait]
pub trait BuildRepository: Send + Sync {
    /// Insert all builds of a pipeline as a single batch
    async fn bulk_insert(&self, builds: Vec<NewBuild>) -> Result<Vec<Build>, StoreError>;
}
