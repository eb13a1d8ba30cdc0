//! Error types for the propagator module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from attribute propagation or destination cleanup.
#[derive(Debug, Error)]
pub enum PropagatorError {
    /// Reading the source metadata failed.
    #[error("Failed to read metadata of {path}")]
    MetadataFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing timestamps or permissions onto the destination failed.
    #[error("Failed to copy attributes onto {path}")]
    ApplyFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Removing the destination failed for a reason other than absence.
    #[error("Failed to delete {path}")]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
