//! Error types for the split engine.
//!
//! Defines `SplitError` for every failure a split can hit. Configuration
//! errors are raised before any traversal starts; object-store and cache
//! write errors abort the run.
//!
//! Error groups:
//! - `NoPrefix`, `DuplicateTarget`, `InvalidPrefix`, `InvalidVersion`,
//!   `RepoNotFound`, `ReferenceNotFound` → configuration
//! - `Git`, `InvalidEntry`, `PathCollision` → object store / tree content
//! - `Cache` → split cache I/O
//! - `Internal` → poisoned locks, dead workers

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("You must provide the directory to split via a prefix")]
    NoPrefix,

    #[error("Cannot have two prefix split under the same directory: {first} -> {to} vs {second} -> {to}")]
    DuplicateTarget {
        to: String,
        first: String,
        second: String,
    },

    #[error("Invalid prefix path: {0}")]
    InvalidPrefix(String),

    #[error("Invalid git version: {0}")]
    InvalidVersion(String),

    #[error("Unsupported file mode {mode:o} at {path}")]
    InvalidEntry { path: String, mode: i32 },

    #[error("Prefixes collide at path: {0}")]
    PathCollision(String),

    #[error("Cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SplitError {
    /// True for errors detected before traversal starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SplitError::RepoNotFound(_)
                | SplitError::ReferenceNotFound(_)
                | SplitError::NoPrefix
                | SplitError::DuplicateTarget { .. }
                | SplitError::InvalidPrefix(_)
                | SplitError::InvalidVersion(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SplitError>;
