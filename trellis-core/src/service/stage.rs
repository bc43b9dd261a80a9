//! Stage Ordering Resolver
//!
//! Orders the job specifications of a configuration document by stage and
//! turns them into build attributes for bulk insertion.

use uuid::Uuid;

use crate::domain::build::{BuildOptions, NewBuild};
use crate::domain::config::{ConfigDocument, JobSpec};

/// Pipeline-level attributes copied onto every build
#[derive(Debug, Clone)]
pub struct BuildContext<'a> {
    pub pipeline_id: Uuid,
    pub project_id: Uuid,
    pub ref_name: &'a str,
    pub tag: bool,
    pub trigger_request_id: Option<Uuid>,
    pub user_id: Uuid,
}

/// Jobs applicable to the ref, ordered by stage index
///
/// The sort is stable: jobs of the same stage keep their declaration order.
/// An empty result is valid here.
pub fn ordered_jobs<'d>(
    document: &'d ConfigDocument,
    ref_name: &str,
    tag: bool,
    trigger_request_id: Option<Uuid>,
) -> Vec<&'d JobSpec> {
    let mut jobs = document.jobs_for_ref(ref_name, tag, trigger_request_id.is_some());
    jobs.sort_by_key(|job| job.stage_idx);
    jobs
}

/// Enrich ordered job specifications with the pipeline context
pub fn derive_builds(jobs: &[&JobSpec], ctx: &BuildContext<'_>) -> Vec<NewBuild> {
    jobs.iter()
        .map(|job| NewBuild {
            pipeline_id: ctx.pipeline_id,
            project_id: ctx.project_id,
            name: job.name.clone(),
            stage: job.stage.clone(),
            stage_idx: job.stage_idx as i32,
            ref_name: ctx.ref_name.to_string(),
            tag: ctx.tag,
            commands: job.commands.clone(),
            tag_list: job.tag_list.clone(),
            variables: job.variables.clone(),
            options: BuildOptions {
                image: job.image.clone(),
                allow_failure: job.allow_failure,
                when: job.when,
            },
            trigger_request_id: ctx.trigger_request_id,
            user_id: ctx.user_id,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::RefFilter;
    use crate::fakes::document;

    fn names(jobs: &[&JobSpec]) -> Vec<String> {
        jobs.iter()
            .map(|j| format!("{}:{}", j.stage, j.name))
            .collect()
    }

    #[test]
    fn test_stable_sort_by_stage() {
        let doc = document(
            &["build", "test", "deploy"],
            &[("A", "deploy"), ("B", "build"), ("C", "test"), ("D", "build")],
        );

        let jobs = ordered_jobs(&doc, "main", false, None);
        assert_eq!(
            names(&jobs),
            vec!["build:B", "build:D", "test:C", "deploy:A"]
        );
    }

    #[test]
    fn test_empty_document_is_valid() {
        let doc = document(&["build"], &[]);
        assert!(ordered_jobs(&doc, "main", false, None).is_empty());
    }

    #[test]
    fn test_filters_applied_before_ordering() {
        let mut doc = document(
            &["build", "deploy"],
            &[("release", "deploy"), ("compile", "build")],
        );
        doc.jobs[0].only = vec![RefFilter::Tags];

        assert_eq!(
            names(&ordered_jobs(&doc, "main", false, None)),
            vec!["build:compile"]
        );
        assert_eq!(
            names(&ordered_jobs(&doc, "v1.0", true, None)),
            vec!["build:compile", "deploy:release"]
        );
    }

    #[test]
    fn test_trigger_filter_uses_trigger_request() {
        let mut doc = document(&["build"], &[("nightly", "build")]);
        doc.jobs[0].only = vec![RefFilter::Triggers];

        assert!(ordered_jobs(&doc, "main", false, None).is_empty());
        assert_eq!(
            ordered_jobs(&doc, "main", false, Some(Uuid::new_v4())).len(),
            1
        );
    }

    #[test]
    fn test_derive_builds_copies_context() {
        let doc = document(
            &["build", "test"],
            &[("unit", "test"), ("compile", "build")],
        );
        let jobs = ordered_jobs(&doc, "main", false, None);
        let trigger = Uuid::new_v4();
        let ctx = BuildContext {
            pipeline_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            ref_name: "main",
            tag: false,
            trigger_request_id: Some(trigger),
            user_id: Uuid::new_v4(),
        };

        let builds = derive_builds(&jobs, &ctx);
        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].name, "compile");
        assert_eq!(builds[0].stage_idx, 0);
        assert_eq!(builds[1].stage_idx, 1);
        for build in &builds {
            assert_eq!(build.pipeline_id, ctx.pipeline_id);
            assert_eq!(build.project_id, ctx.project_id);
            assert_eq!(build.ref_name, "main");
            assert_eq!(build.trigger_request_id, Some(trigger));
            assert_eq!(build.user_id, ctx.user_id);
        }
    }
}
