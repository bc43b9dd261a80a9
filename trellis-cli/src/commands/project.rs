//! Project command handlers

use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use colored::*;
use trellis_core::domain::project::Project;
use trellis_core::dto::project::{AccessLevel, AddMember, CreateProject};
use uuid::Uuid;

use crate::api::ApiClient;
use crate::config::Config;

/// Project subcommands
#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Register a project
    Create {
        /// Namespaced project path, e.g. acme/widgets
        #[arg(short, long)]
        path: String,

        /// Path of the git repository on the orchestrator host
        #[arg(short, long)]
        repository: String,

        /// Register with builds disabled
        #[arg(long)]
        builds_disabled: bool,
    },
    /// Get project details
    Get {
        /// Project ID
        id: Uuid,
    },
    /// Add a member or change their access level
    AddMember {
        /// Project ID
        id: Uuid,

        #[arg(long)]
        user: Uuid,

        #[arg(long)]
        username: String,

        #[arg(long, value_enum, default_value = "developer")]
        access: Access,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Access {
    Guest,
    Reporter,
    Developer,
    Maintainer,
}

impl From<Access> for AccessLevel {
    fn from(access: Access) -> Self {
        match access {
            Access::Guest => AccessLevel::Guest,
            Access::Reporter => AccessLevel::Reporter,
            Access::Developer => AccessLevel::Developer,
            Access::Maintainer => AccessLevel::Maintainer,
        }
    }
}

/// Handle project commands
pub async fn handle_project_command(command: ProjectCommands, config: &Config) -> Result<()> {
    let client = ApiClient::new(&config.orchestrator_url);

    match command {
        ProjectCommands::Create {
            path,
            repository,
            builds_disabled,
        } => {
            let req = CreateProject {
                path_with_namespace: path,
                repository_path: repository,
                builds_enabled: !builds_disabled,
            };
            let project = client.create_project(&req).await?;

            println!("{}", "✓ Project created successfully!".green().bold());
            print_project(&project);
            Ok(())
        }
        ProjectCommands::Get { id } => {
            let project = client.get_project(id).await?;
            print_project(&project);
            Ok(())
        }
        ProjectCommands::AddMember {
            id,
            user,
            username,
            access,
        } => {
            let req = AddMember {
                user_id: user,
                username: username.clone(),
                access_level: access.into(),
            };
            client.add_member(id, &req).await?;

            println!(
                "{}",
                format!("✓ {} added to project {}", username, id)
                    .green()
                    .bold()
            );
            Ok(())
        }
    }
}

fn print_project(project: &Project) {
    println!("  ID:         {}", project.id.to_string().cyan());
    println!("  Path:       {}", project.path_with_namespace.bold());
    println!("  Repository: {}", project.repository_path.dimmed());
    let builds = if project.builds_enabled {
        "enabled".green()
    } else {
        "disabled".red()
    };
    println!("  Builds:     {}", builds);
}
