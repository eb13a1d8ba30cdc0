//! File system propagator implementation.

use async_trait::async_trait;
use filetime::FileTime;
use std::path::Path;
use tokio::fs;
use tracing::debug;

use super::error::PropagatorError;
use super::traits::AttributePropagator;

/// Copies access/modification times and permission bits with the local
/// filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsAttributePropagator;

impl FsAttributePropagator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AttributePropagator for FsAttributePropagator {
    async fn copy_attributes(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<(), PropagatorError> {
        let metadata = fs::metadata(source)
            .await
            .map_err(|e| PropagatorError::MetadataFailed {
                path: source.to_path_buf(),
                source: e,
            })?;

        fs::set_permissions(destination, metadata.permissions())
            .await
            .map_err(|e| PropagatorError::ApplyFailed {
                path: destination.to_path_buf(),
                source: e,
            })?;

        let atime = FileTime::from_last_access_time(&metadata);
        let mtime = FileTime::from_last_modification_time(&metadata);
        let target = destination.to_path_buf();
        tokio::task::spawn_blocking(move || filetime::set_file_times(&target, atime, mtime))
            .await
            .map_err(|e| PropagatorError::ApplyFailed {
                path: destination.to_path_buf(),
                source: std::io::Error::other(e),
            })?
            .map_err(|e| PropagatorError::ApplyFailed {
                path: destination.to_path_buf(),
                source: e,
            })?;

        debug!(
            source = %source.display(),
            destination = %destination.display(),
            "Copied file attributes"
        );
        Ok(())
    }

    async fn delete_file(&self, destination: &Path) -> Result<(), PropagatorError> {
        match fs::remove_file(destination).await {
            Ok(()) => {
                debug!(path = %destination.display(), "Deleted file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PropagatorError::DeleteFailed {
                path: destination.to_path_buf(),
                source: e,
            }),
        }
    }
}
