//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod lint;
mod pipeline;
mod project;

pub use pipeline::PipelineCommands;
pub use project::ProjectCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Pipeline management
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Project management
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Validate a configuration file locally and show the builds it produces
    Lint {
        /// Path to the configuration file
        file: String,

        /// Ref the builds are planned for
        #[arg(long = "ref", default_value = "main")]
        ref_name: String,

        /// Treat the ref as a tag
        #[arg(long)]
        tag: bool,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, config).await,
        Commands::Project { command } => project::handle_project_command(command, config).await,
        Commands::Lint {
            file,
            ref_name,
            tag,
        } => lint::lint_file(&file, &ref_name, tag),
    }
}
