//! Trait definitions for the propagator module.

use async_trait::async_trait;
use std::path::Path;

use super::error::PropagatorError;

/// Filesystem collaborator used by the engine after an encode returns.
#[async_trait]
pub trait AttributePropagator: Send + Sync {
    /// Best-effort copy of modification time and permissions from
    /// `source` onto `destination`. The engine logs failures and still
    /// completes the job.
    async fn copy_attributes(&self, source: &Path, destination: &Path)
        -> Result<(), PropagatorError>;

    /// Removes `destination` if present. A missing file is not an error.
    async fn delete_file(&self, destination: &Path) -> Result<(), PropagatorError>;
}
