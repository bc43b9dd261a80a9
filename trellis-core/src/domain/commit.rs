//! Commit domain types

use serde::{Deserialize, Serialize};

/// A commit object resolved from the project repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
}

impl Commit {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}
