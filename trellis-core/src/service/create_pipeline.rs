//! Pipeline Assembler
//!
//! Builds a pipeline for one ref and commit. Gates run strictly in order and
//! the first failing gate decides the rejection:
//!
//! 1. builds enabled on the project
//! 2. acting user may create pipelines
//! 3. ref exists
//! 4. commit exists
//! 5. skip directive (when honored)
//! 6. configuration present and valid; the pipeline is persisted with the
//!    error when `persist_on_config_error` is set
//! 7. at least one build for the ref
//!
//! Then the pipeline is inserted, its builds are inserted as one batch and the
//! pipeline is enqueued for the scheduler.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::pipeline::{Pipeline, PipelineStatus};
use crate::domain::project::{Ability, Project, User};
use crate::dto::pipeline::CreatePipeline;
use crate::error::PipelineError;
use crate::ports::{
    AuthzService, BuildRepository, CommitStore, ConfigParser, ConfigStore, PipelineRepository,
    RefStore,
};
use crate::service::config_loader::ConfigLoader;
use crate::service::outcome::PipelineOutcome;
use crate::service::reference::{self, RefSpec, ReferenceResolver};
use crate::service::stage::{self, BuildContext};

/// Everything the assembler talks to
#[derive(Clone)]
pub struct Collaborators {
    pub refs: Arc<dyn RefStore>,
    pub commits: Arc<dyn CommitStore>,
    pub configs: Arc<dyn ConfigStore>,
    pub parser: Arc<dyn ConfigParser>,
    pub authz: Arc<dyn AuthzService>,
    pub pipelines: Arc<dyn PipelineRepository>,
    pub builds: Arc<dyn BuildRepository>,
}

#[derive(Clone)]
pub struct CreatePipelineService {
    deps: Collaborators,
}

impl CreatePipelineService {
    pub fn new(deps: Collaborators) -> Self {
        Self { deps }
    }

    /// Create a pipeline without external cancellation
    pub async fn execute(
        &self,
        project: &Project,
        user: &User,
        params: &CreatePipeline,
    ) -> PipelineOutcome {
        self.execute_with_cancellation(project, user, params, &CancellationToken::new())
            .await
    }

    /// Create a pipeline, stopping at the next gate once `cancel` fires
    ///
    /// Cancellation is observed up to the pipeline insert. From there on the
    /// builds batch and the enqueue always run so that a persisted pipeline
    /// never ends up with a partial build set because of cancellation.
    pub async fn execute_with_cancellation(
        &self,
        project: &Project,
        user: &User,
        params: &CreatePipeline,
        cancel: &CancellationToken,
    ) -> PipelineOutcome {
        let reference = RefSpec::parse(&params.ref_name);
        let mut pipeline = Pipeline {
            id: None,
            project_id: project.id,
            ref_name: reference.name.clone(),
            sha: None,
            before_sha: reference::before_sha(params),
            tag: reference.tag,
            yaml_errors: None,
            status: PipelineStatus::Created,
            created_at: chrono::Utc::now(),
        };

        tracing::debug!(
            "Creating pipeline for {}@{} by {}",
            project.path_with_namespace,
            reference.raw,
            user.username
        );

        if !project.builds_enabled {
            return PipelineOutcome::rejected(pipeline, PipelineError::FeatureDisabled);
        }

        let allowed = match guarded(
            cancel,
            self.deps.authz.can(user, Ability::CreatePipeline, project),
        )
        .await
        {
            Ok(Ok(allowed)) => allowed,
            Ok(Err(e)) => {
                tracing::error!("Authorization check failed for {}: {}", user.username, e);
                false
            }
            Err(cancelled) => return PipelineOutcome::rejected(pipeline, cancelled),
        };
        if !allowed {
            return PipelineOutcome::rejected(pipeline, PipelineError::Unauthorized);
        }

        let resolver = ReferenceResolver::new(&*self.deps.refs, &*self.deps.commits);

        let ref_check = guarded(cancel, resolver.ensure_ref_exists(project, &reference)).await;
        if let Err(e) = flatten(ref_check) {
            return PipelineOutcome::rejected(pipeline, e);
        }

        let lookup = guarded(cancel, resolver.resolve_commit(project, &reference, params)).await;
        let commit = match flatten(lookup) {
            Ok(commit) => commit,
            Err(e) => return PipelineOutcome::rejected(pipeline, e),
        };
        pipeline.sha = Some(commit.id.clone());

        // Loaded once; the skip and configuration gates share this value.
        let loader = ConfigLoader::new(&*self.deps.configs, Arc::clone(&self.deps.parser));
        let config = match guarded(cancel, loader.load(project, &commit)).await {
            Ok(config) => config,
            Err(cancelled) => return PipelineOutcome::rejected(pipeline, cancelled),
        };

        if params.honor_skip_directive && config.skip() {
            return PipelineOutcome::rejected(pipeline, PipelineError::SkippedByDirective);
        }

        let document = match (config.error(), config.document()) {
            (None, Some(document)) => document,
            (error, _) => {
                let error = error.unwrap_or(PipelineError::ConfigurationMissing);
                pipeline.yaml_errors = Some(error.to_string());

                // The only rejection that writes state: an audit row for the
                // broken configuration.
                if params.persist_on_config_error {
                    match guarded(cancel, self.deps.pipelines.insert(&pipeline)).await {
                        Ok(Ok(id)) => pipeline.id = Some(id),
                        Ok(Err(e)) => {
                            tracing::error!(
                                "Failed to persist pipeline with configuration error: {}",
                                e
                            );
                        }
                        Err(cancelled) => {
                            return PipelineOutcome::rejected(pipeline, cancelled);
                        }
                    }
                }
                return PipelineOutcome::rejected(pipeline, error);
            }
        };

        let jobs = stage::ordered_jobs(
            document,
            &pipeline.ref_name,
            pipeline.tag,
            params.trigger_request_id,
        );
        if jobs.is_empty() {
            return PipelineOutcome::rejected(pipeline, PipelineError::NoExecutableJobs);
        }

        if cancel.is_cancelled() {
            return PipelineOutcome::rejected(pipeline, PipelineError::Cancelled);
        }

        let pipeline_id = match self.deps.pipelines.insert(&pipeline).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("Failed to insert pipeline: {}", e);
                return PipelineOutcome::rejected(pipeline, PipelineError::PersistenceFailed);
            }
        };
        pipeline.id = Some(pipeline_id);

        let new_builds = stage::derive_builds(
            &jobs,
            &BuildContext {
                pipeline_id,
                project_id: project.id,
                ref_name: &pipeline.ref_name,
                tag: pipeline.tag,
                trigger_request_id: params.trigger_request_id,
                user_id: user.id,
            },
        );

        let builds = match self.deps.builds.bulk_insert(new_builds).await {
            Ok(builds) => builds,
            Err(e) => {
                tracing::error!("Failed to insert builds of pipeline {}: {}", pipeline_id, e);
                return PipelineOutcome::rejected(pipeline, PipelineError::PersistenceFailed);
            }
        };

        if let Err(e) = self.deps.pipelines.enqueue(pipeline_id).await {
            tracing::error!("Failed to enqueue pipeline {}: {}", pipeline_id, e);
            return PipelineOutcome::rejected(pipeline, PipelineError::PersistenceFailed);
        }
        pipeline.status = PipelineStatus::Pending;

        tracing::info!(
            "Pipeline created: {} for {}@{} with {} build(s)",
            pipeline_id,
            project.path_with_namespace,
            pipeline.ref_name,
            builds.len()
        );

        PipelineOutcome::Assembled { pipeline, builds }
    }
}

/// Await `fut` unless `cancel` fires first
async fn guarded<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, PipelineError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled),
        output = fut => Ok(output),
    }
}

fn flatten<T>(result: Result<Result<T, PipelineError>, PipelineError>) -> Result<T, PipelineError> {
    result.and_then(|inner| inner)
}
