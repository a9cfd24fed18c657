//! Error types shared by every layer of the dark library
//!
//! Each variant names the precondition that was violated so the CLI can
//! print it as-is. Lower-level faults (SQLite, filesystem) are wrapped with
//! the operation that was being attempted.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, DarkError>;

#[derive(Debug, Error)]
pub enum DarkError {
    /// Missing or malformed user input, nothing was changed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("a library named '{0}' already exists")]
    DuplicateName(String),

    #[error("no library named '{0}'")]
    NotFound(String),

    /// Header extraction failed for one file (skipped during indexing)
    #[error("unreadable frame {}: {reason}", path.display())]
    UnreadableFrame { path: PathBuf, reason: String },

    #[error("at least 2 matching frames are required for stacking, found {found}")]
    InsufficientFrames { found: usize },

    #[error("cannot prepare staging directory {}: {source}", path.display())]
    StagingConflict {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The external stacking engine failed or could not be reached
    #[error("master dark synthesis failed: {0}")]
    SynthesisBackend(String),

    #[error("frame catalog error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("library registry {} is unusable: {reason}", path.display())]
    Registry { path: PathBuf, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl DarkError {
    /// Wrap an I/O error with the operation that failed
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        DarkError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        DarkError::InvalidInput(message.into())
    }
}
