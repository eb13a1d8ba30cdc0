//! Trait definitions for the encoder module.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::EncodeError;
use crate::queue::Percent;

/// Receives one human readable diagnostic line from the encoder, in emission order.
pub type LogLineCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Receives a non-decreasing progress report for the running encode.
pub type ProgressCallback = Arc<dyn Fn(Percent) + Send + Sync>;

/// Encodes one source file into one destination file.
///
/// A strategy instance is created per job and dropped once `encode`
/// returns. `terminate` may be called from another task while `encode`
/// is running and must make it return in bounded time. A strategy that
/// cannot unblock promptly stalls the whole engine unless a terminate
/// grace period is configured.
#[async_trait]
pub trait EncoderStrategy: Send + Sync {
    /// Returns the name of this strategy.
    fn name(&self) -> &str;

    /// The path `encode` writes to for `source`.
    fn destination(&self, source: &Path) -> PathBuf;

    /// Encodes `source`, returning the destination path.
    ///
    /// The destination's state after an error is undefined; cleanup is
    /// the caller's job.
    async fn encode(
        &self,
        source: &Path,
        on_log: LogLineCallback,
        on_progress: ProgressCallback,
    ) -> Result<PathBuf, EncodeError>;

    /// Requests a cooperative abort of the in-flight `encode`. No-op when idle.
    fn terminate(&self);
}

/// Selects the strategy for a source file.
///
/// Selection must be deterministic and free of side effects beyond
/// allocating the strategy.
pub trait StrategyFactory: Send + Sync {
    /// Returns a fresh strategy for `source`, or `EncodeError::UnsupportedFormat`.
    fn create(&self, source: &Path) -> Result<Arc<dyn EncoderStrategy>, EncodeError>;
}

impl<F: StrategyFactory + ?Sized> StrategyFactory for Arc<F> {
    fn create(&self, source: &Path) -> Result<Arc<dyn EncoderStrategy>, EncodeError> {
        (**self).create(source)
    }
}
