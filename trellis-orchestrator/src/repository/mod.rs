//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each repository handles database operations for a specific domain entity
//! and adapts them to the pipeline assembler's ports.

pub mod build;
pub mod pipeline;
pub mod project;

// Re-export for convenience
pub use build as build_repository;
pub use pipeline as pipeline_repository;
pub use project as project_repository;
