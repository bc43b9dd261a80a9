//! Data Transfer Objects
//!
//! Request types exchanged between the CLI and the orchestrator.

pub mod pipeline;
pub mod project;
