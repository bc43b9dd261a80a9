//! In-memory port implementations
//!
//! Used by the unit and integration tests of the pipeline assembler. Every
//! fake counts its calls so tests can assert which gates ran.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::build::{Build, NewBuild};
use crate::domain::commit::Commit;
use crate::domain::config::{ConfigDocument, JobSpec, When};
use crate::domain::pipeline::{Pipeline, PipelineStatus};
use crate::domain::project::{Ability, Project, User};
use crate::error::{ParseError, StoreError};
use crate::ports::{
    AuthzService, BuildRepository, CommitStore, ConfigParser, ConfigStore, PipelineRepository,
    RefStore,
};

/// A project with builds enabled
pub fn project() -> Project {
    Project {
        id: Uuid::new_v4(),
        path_with_namespace: "acme/widgets".to_string(),
        repository_path: "/srv/git/acme/widgets.git".to_string(),
        builds_enabled: true,
        created_at: chrono::Utc::now(),
    }
}

pub fn user() -> User {
    User {
        id: Uuid::new_v4(),
        username: "alice".to_string(),
    }
}

/// A job specification with default attributes
pub fn job(name: &str, stage: &str, stage_idx: usize) -> JobSpec {
    JobSpec {
        name: name.to_string(),
        stage: stage.to_string(),
        stage_idx,
        commands: format!("make {}", name),
        tag_list: vec![],
        variables: HashMap::new(),
        image: None,
        allow_failure: false,
        when: When::OnSuccess,
        only: vec![],
        except: vec![],
    }
}

/// A document with the given stages and `(name, stage)` jobs
///
/// Panics if a job names an undeclared stage.
pub fn document(stages: &[&str], jobs: &[(&str, &str)]) -> ConfigDocument {
    let stages: Vec<String> = stages.iter().map(|s| s.to_string()).collect();
    let jobs = jobs
        .iter()
        .map(|(name, stage)| {
            let idx = stages
                .iter()
                .position(|s| s == stage)
                .unwrap_or_else(|| panic!("undeclared stage {stage}"));
            job(name, stage, idx)
        })
        .collect();

    ConfigDocument {
        stages,
        jobs,
        skip: false,
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Ref, commit and configuration store backed by maps
#[derive(Default)]
pub struct FakeRepository {
    refs: HashSet<String>,
    commits: HashMap<String, String>,
    documents: HashMap<String, String>,
    unavailable: bool,
    ref_calls: AtomicUsize,
    commit_calls: AtomicUsize,
    document_calls: AtomicUsize,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Branch `name` pointing at `sha`
    pub fn with_branch(mut self, name: &str, sha: &str) -> Self {
        self.refs.insert(name.to_string());
        self.commits.insert(name.to_string(), sha.to_string());
        self.commits
            .insert(format!("refs/heads/{name}"), sha.to_string());
        self.commits.insert(sha.to_string(), sha.to_string());
        self
    }

    /// Tag `name` pointing at `sha`
    pub fn with_tag(mut self, name: &str, sha: &str) -> Self {
        self.refs.insert(name.to_string());
        self.commits.insert(name.to_string(), sha.to_string());
        self.commits
            .insert(format!("refs/tags/{name}"), sha.to_string());
        self.commits.insert(sha.to_string(), sha.to_string());
        self
    }

    /// Commit reachable only by its id
    pub fn with_commit(mut self, sha: &str) -> Self {
        self.commits.insert(sha.to_string(), sha.to_string());
        self
    }

    /// Configuration file content at commit `sha`
    pub fn with_document(mut self, sha: &str, content: &str) -> Self {
        self.documents.insert(sha.to_string(), content.to_string());
        self
    }

    /// Make every lookup fail with a backend error
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn ref_calls(&self) -> usize {
        self.ref_calls.load(Ordering::SeqCst)
    }

    pub fn commit_calls(&self) -> usize {
        self.commit_calls.load(Ordering::SeqCst)
    }

    pub fn document_calls(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            Err(StoreError::Command("repository offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RefStore for FakeRepository {
    async fn ref_names(&self, _project: &Project) -> Result<HashSet<String>, StoreError> {
        self.ref_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.refs.clone())
    }
}

#[async_trait]
impl CommitStore for FakeRepository {
    async fn find_commit(
        &self,
        _project: &Project,
        ref_or_sha: &str,
    ) -> Result<Option<Commit>, StoreError> {
        self.commit_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.commits.get(ref_or_sha).map(Commit::new))
    }
}

#[async_trait]
impl ConfigStore for FakeRepository {
    async fn fetch_document(
        &self,
        _project: &Project,
        commit: &Commit,
    ) -> Result<Option<String>, StoreError> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.documents.get(&commit.id).cloned())
    }
}

// =============================================================================
// Parser
// =============================================================================

/// What a [`StaticParser`] does when called
pub enum ParserBehavior {
    Document(ConfigDocument),
    Fail(ParseError),
    Panic,
    /// Block the calling thread, then return an empty document
    Sleep(Duration),
}

/// Parser returning a canned result regardless of input
pub struct StaticParser {
    behavior: ParserBehavior,
    calls: AtomicUsize,
}

impl StaticParser {
    pub fn new(behavior: ParserBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConfigParser for StaticParser {
    fn parse(&self, _raw: &str, _namespace: &str) -> Result<ConfigDocument, ParseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            ParserBehavior::Document(doc) => Ok(doc.clone()),
            ParserBehavior::Fail(err) => Err(err.clone()),
            ParserBehavior::Panic => panic!("parser blew up"),
            ParserBehavior::Sleep(duration) => {
                std::thread::sleep(*duration);
                Ok(document(&[], &[]))
            }
        }
    }
}

// =============================================================================
// Authorization
// =============================================================================

pub struct StaticAuthz {
    allow: bool,
    calls: AtomicUsize,
}

impl StaticAuthz {
    pub fn allow() -> Self {
        Self {
            allow: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn deny() -> Self {
        Self {
            allow: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthzService for StaticAuthz {
    async fn can(
        &self,
        _user: &User,
        _ability: Ability,
        _project: &Project,
    ) -> Result<bool, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.allow)
    }
}

// =============================================================================
// Persistence
// =============================================================================

/// Pipeline and build storage in memory
#[derive(Default)]
pub struct InMemoryStore {
    pipelines: Mutex<Vec<Pipeline>>,
    builds: Mutex<Vec<Build>>,
    fail_builds: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every build batch fail
    pub fn failing_builds() -> Self {
        Self {
            fail_builds: true,
            ..Self::default()
        }
    }

    pub fn pipelines(&self) -> Vec<Pipeline> {
        self.pipelines.lock().unwrap().clone()
    }

    pub fn builds(&self) -> Vec<Build> {
        self.builds.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelineRepository for InMemoryStore {
    async fn insert(&self, pipeline: &Pipeline) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        let mut stored = pipeline.clone();
        stored.id = Some(id);
        self.pipelines.lock().unwrap().push(stored);
        Ok(id)
    }

    async fn enqueue(&self, pipeline_id: Uuid) -> Result<(), StoreError> {
        let mut pipelines = self.pipelines.lock().unwrap();
        let pipeline = pipelines
            .iter_mut()
            .find(|p| p.id == Some(pipeline_id))
            .ok_or_else(|| StoreError::NotFound(format!("pipeline {pipeline_id}")))?;
        pipeline.status = PipelineStatus::Pending;
        Ok(())
    }
}

#[async_trait]
impl BuildRepository for InMemoryStore {
    async fn bulk_insert(&self, builds: Vec<NewBuild>) -> Result<Vec<Build>, StoreError> {
        if self.fail_builds {
            return Err(StoreError::Command("disk full".to_string()));
        }

        let now = chrono::Utc::now();
        let created: Vec<Build> = builds
            .into_iter()
            .map(|b| b.into_build(Uuid::new_v4(), now))
            .collect();
        self.builds.lock().unwrap().extend(created.iter().cloned());
        Ok(created)
    }
}
