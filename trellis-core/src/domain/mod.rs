//! Core domain types
//!
//! Entities shared between the orchestrator (which persists them) and the CLI
//! (which displays them), plus the structured configuration document produced
//! by the configuration parser.

pub mod build;
pub mod commit;
pub mod config;
pub mod pipeline;
pub mod project;
