use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trellis_config::LuaConfigParser;
use trellis_core::CreatePipelineService;
use trellis_core::service::create_pipeline::Collaborators;

pub mod api;
pub mod config;
pub mod db;
pub mod git;
pub mod repository;
pub mod service;

use crate::config::Config;
use crate::git::GitRepository;
use crate::repository::build::PgBuildRepository;
use crate::repository::pipeline::PgPipelineRepository;
use crate::repository::project::MembershipAuthz;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "trellis_orchestrator=debug,trellis_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Trellis Orchestrator...");

    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Connecting to database...");

    let pool = db::create_pool(&config.database_url, config.max_connections)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let git = Arc::new(GitRepository::new(
        config.git_binary.clone(),
        config.config_file_name.clone(),
    ));

    let assembler = CreatePipelineService::new(Collaborators {
        refs: git.clone(),
        commits: git.clone(),
        configs: git,
        parser: Arc::new(LuaConfigParser::new()),
        authz: Arc::new(MembershipAuthz::new(pool.clone())),
        pipelines: Arc::new(PgPipelineRepository::new(pool.clone())),
        builds: Arc::new(PgBuildRepository::new(pool.clone())),
    });

    tracing::info!(
        "Reading {} from project repositories with {}",
        config.config_file_name,
        config.git_binary
    );

    // Build router with all API endpoints
    let app = api::create_router(api::AppState {
        pool,
        assembler,
        request_timeout: config.request_timeout,
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
