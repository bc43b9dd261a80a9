//! Trellis Core
//!
//! Pipeline construction engine for the Trellis CI system.
//!
//! This crate contains:
//! - Domain types: Pipeline, Build, Project and the parsed configuration document
//! - DTOs: request types shared by the orchestrator and the CLI
//! - Ports: the storage, repository, parser and authorization seams
//! - Services: reference resolution, configuration loading, stage ordering and
//!   the pipeline assembler that ties them together

pub mod domain;
pub mod dto;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fakes;
pub mod ports;
pub mod service;

pub use error::{ParseError, PipelineError, StoreError};
pub use service::create_pipeline::CreatePipelineService;
pub use service::outcome::PipelineOutcome;
