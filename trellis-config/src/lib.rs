//! Trellis configuration language
//!
//! Project configuration files are Lua chunks evaluated in a restricted
//! sandbox. The chunk returns a table describing stages and jobs, which the
//! parser validates and turns into a [`ConfigDocument`].

pub mod parser;
pub mod sandbox;

pub use parser::LuaConfigParser;
pub use sandbox::{SandboxLimits, create_sandbox};

pub use trellis_core::domain::config::ConfigDocument;
