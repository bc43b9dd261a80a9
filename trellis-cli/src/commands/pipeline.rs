//! Pipeline command handlers
//!
//! Handles pipeline creation, listing, inspection and deletion.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use trellis_core::PipelineOutcome;
use trellis_core::domain::build::Build;
use trellis_core::domain::pipeline::Pipeline;
use trellis_core::dto::pipeline::{CreatePipeline, CreatePipelineRequest};
use uuid::Uuid;

use crate::api::ApiClient;
use crate::config::Config;
use crate::id_resolver::resolve_pipeline_id;
use crate::types::IdOrPrefix;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Create a pipeline for a ref
    Create {
        /// Project ID
        #[arg(long)]
        project: Uuid,

        /// Acting user ID
        #[arg(long)]
        user: Uuid,

        /// Branch, tag or full ref (refs/heads/..., refs/tags/...)
        #[arg(long = "ref")]
        ref_name: String,

        /// Commit to build instead of the ref head
        #[arg(long)]
        after: Option<String>,

        /// Prior commit of the push
        #[arg(long)]
        before: Option<String>,

        /// Explicit checkout commit
        #[arg(long)]
        checkout_sha: Option<String>,

        /// Ignore the configuration's skip directive
        #[arg(long)]
        ignore_skip: bool,

        /// Do not keep a pipeline record when the configuration is broken
        #[arg(long)]
        no_save_errors: bool,

        /// Trigger request to attach the builds to
        #[arg(long)]
        trigger: Option<Uuid>,
    },
    /// List the pipelines of a project
    List {
        #[arg(long)]
        project: Uuid,
    },
    /// Get pipeline details
    Get {
        /// Pipeline ID or unambiguous prefix
        id: String,

        /// Project to resolve a prefix in
        #[arg(long)]
        project: Option<Uuid>,
    },
    /// List the builds of a pipeline
    Builds {
        /// Pipeline ID or unambiguous prefix
        id: String,

        #[arg(long)]
        project: Option<Uuid>,
    },
    /// Delete a pipeline
    Delete {
        /// Pipeline ID or unambiguous prefix
        id: String,

        #[arg(long)]
        project: Option<Uuid>,
    },
}

/// Handle pipeline commands
pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    let client = ApiClient::new(&config.orchestrator_url);

    match command {
        PipelineCommands::Create {
            project,
            user,
            ref_name,
            after,
            before,
            checkout_sha,
            ignore_skip,
            no_save_errors,
            trigger,
        } => {
            let req = CreatePipelineRequest {
                project_id: project,
                user_id: user,
                params: CreatePipeline {
                    after,
                    before,
                    checkout_sha,
                    honor_skip_directive: !ignore_skip,
                    persist_on_config_error: !no_save_errors,
                    trigger_request_id: trigger,
                    ..CreatePipeline::new(ref_name)
                },
            };
            create_pipeline(&client, &req).await
        }
        PipelineCommands::List { project } => list_pipelines(&client, project).await,
        PipelineCommands::Get { id, project } => get_pipeline(&client, project, &id).await,
        PipelineCommands::Builds { id, project } => list_builds(&client, project, &id).await,
        PipelineCommands::Delete { id, project } => delete_pipeline(&client, project, &id).await,
    }
}

/// Request a pipeline and report the outcome
///
/// A rejected pipeline is reported and turned into an error so the process
/// exits non-zero.
async fn create_pipeline(client: &ApiClient, req: &CreatePipelineRequest) -> Result<()> {
    let outcome = client.create_pipeline(req).await?;

    match &outcome {
        PipelineOutcome::Assembled { pipeline, builds } => {
            println!("{}", "✓ Pipeline created successfully!".green().bold());
            print_pipeline_details(pipeline);
            println!();
            print_builds(builds);
            Ok(())
        }
        PipelineOutcome::Rejected { pipeline, .. } => {
            println!("{}", "✗ Pipeline was not created".red().bold());
            for message in outcome.messages() {
                println!("  {} {}", "▸".red(), message);
            }
            if let Some(id) = pipeline.id {
                println!(
                    "  {}",
                    format!("Recorded as pipeline {} for auditing", id).dimmed()
                );
            }
            anyhow::bail!("pipeline rejected: {}", outcome.messages().join("; "))
        }
    }
}

async fn list_pipelines(client: &ApiClient, project: Uuid) -> Result<()> {
    let pipelines = client.list_pipelines(project).await?;

    if pipelines.is_empty() {
        println!("{}", "No pipelines found.".yellow());
    } else {
        println!(
            "{}",
            format!("Found {} pipeline(s):", pipelines.len()).bold()
        );
        println!();
        for pipeline in pipelines {
            print_pipeline_summary(&pipeline);
        }
    }

    Ok(())
}

async fn get_pipeline(client: &ApiClient, project: Option<Uuid>, id: &str) -> Result<()> {
    let uuid = resolve_pipeline_id(client, project, &IdOrPrefix::parse(id)).await?;

    let pipeline = client.get_pipeline(uuid).await?;

    print_pipeline_details(&pipeline);

    Ok(())
}

async fn list_builds(client: &ApiClient, project: Option<Uuid>, id: &str) -> Result<()> {
    let uuid = resolve_pipeline_id(client, project, &IdOrPrefix::parse(id)).await?;

    let builds = client.list_builds(uuid).await?;

    if builds.is_empty() {
        println!("{}", "No builds found.".yellow());
    } else {
        print_builds(&builds);
    }

    Ok(())
}

async fn delete_pipeline(client: &ApiClient, project: Option<Uuid>, id: &str) -> Result<()> {
    let uuid = resolve_pipeline_id(client, project, &IdOrPrefix::parse(id)).await?;

    client.delete_pipeline(uuid).await?;

    println!(
        "{}",
        format!("✓ Pipeline {} deleted successfully!", uuid)
            .green()
            .bold()
    );

    Ok(())
}

fn short_sha(sha: Option<&str>) -> String {
    sha.map(|s| s.chars().take(8).collect())
        .unwrap_or_else(|| "-".to_string())
}

fn print_pipeline_summary(pipeline: &Pipeline) {
    let id = pipeline.id.map(|id| id.to_string()).unwrap_or_default();
    println!(
        "  {} {} {}",
        "▸".cyan(),
        pipeline.ref_name.bold(),
        short_sha(pipeline.sha.as_deref()).dimmed()
    );
    println!("    ID:      {}", id.dimmed());
    println!("    Status:  {}", pipeline.status.to_string().yellow());
    println!(
        "    Created: {}",
        pipeline
            .created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    if let Some(errors) = &pipeline.yaml_errors {
        println!("    Errors:  {}", errors.red());
    }
    println!();
}

fn print_pipeline_details(pipeline: &Pipeline) {
    let id = pipeline.id.map(|id| id.to_string()).unwrap_or_default();
    println!("{}", "Pipeline Details:".bold());
    println!("  ID:      {}", id.cyan());
    println!(
        "  Ref:     {} {}",
        pipeline.ref_name.bold(),
        if pipeline.tag { "(tag)" } else { "" }
    );
    println!("  SHA:     {}", pipeline.sha.as_deref().unwrap_or("-"));
    println!("  Before:  {}", pipeline.before_sha.dimmed());
    println!("  Status:  {}", pipeline.status.to_string().yellow());
    println!(
        "  Created: {}",
        pipeline.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(errors) = &pipeline.yaml_errors {
        println!("  Errors:  {}", errors.red());
    }
}

fn print_builds(builds: &[Build]) {
    println!("{}", format!("Builds ({}):", builds.len()).bold());
    let mut current_stage: Option<&str> = None;
    for build in builds {
        if current_stage != Some(build.stage.as_str()) {
            println!("  {} {}", "▸".cyan(), build.stage.bold());
            current_stage = Some(build.stage.as_str());
        }
        println!(
            "    - {} {}",
            build.name,
            build.id.to_string().dimmed()
        );
    }
}
