//! Service Module
//!
//! Pipeline construction logic. The assembler in `create_pipeline` drives the
//! other services and talks to the outside world only through `crate::ports`.

pub mod config_loader;
pub mod create_pipeline;
pub mod outcome;
pub mod reference;
pub mod stage;
