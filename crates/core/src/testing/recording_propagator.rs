//! Recording attribute propagator for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::propagator::{AttributePropagator, FsAttributePropagator, PropagatorError};

/// Records every call and deletes files for real.
///
/// Attribute copies are only recorded; `set_fail_copies(true)` makes them
/// fail instead.
#[derive(Debug, Default)]
pub struct RecordingPropagator {
    copies: Arc<RwLock<Vec<(PathBuf, PathBuf)>>>,
    deletes: Arc<RwLock<Vec<PathBuf>>>,
    fail_copies: AtomicBool,
}

impl RecordingPropagator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(source, destination)` pairs passed to `copy_attributes`.
    pub async fn copies(&self) -> Vec<(PathBuf, PathBuf)> {
        self.copies.read().await.clone()
    }

    /// Paths passed to `delete_file`.
    pub async fn deletes(&self) -> Vec<PathBuf> {
        self.deletes.read().await.clone()
    }

    pub fn set_fail_copies(&self, fail: bool) {
        self.fail_copies.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AttributePropagator for RecordingPropagator {
    async fn copy_attributes(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<(), PropagatorError> {
        self.copies
            .write()
            .await
            .push((source.to_path_buf(), destination.to_path_buf()));

        if self.fail_copies.load(Ordering::SeqCst) {
            return Err(PropagatorError::ApplyFailed {
                path: destination.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "mock failure"),
            });
        }
        Ok(())
    }

    async fn delete_file(&self, destination: &Path) -> Result<(), PropagatorError> {
        self.deletes.write().await.push(destination.to_path_buf());
        FsAttributePropagator.delete_file(destination).await
    }
}
