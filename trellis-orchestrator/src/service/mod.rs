//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services orchestrate between repositories and the pipeline assembler.

pub mod pipeline;
pub mod project;

// Re-export for convenience
pub use pipeline as pipeline_service;
pub use project as project_service;
