//! Extension-based strategy selection.

use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;

use super::config::EncoderConfig;
use super::error::EncodeError;
use super::ffmpeg::FfmpegStrategy;
use super::traits::{EncoderStrategy, StrategyFactory};
use super::types::{MediaCategory, MediaKind};

/// Creates an [`FfmpegStrategy`] with the video or audio profile that
/// matches the source extension.
#[derive(Clone)]
pub struct FfmpegStrategyFactory {
    config: Arc<EncoderConfig>,
}

impl FfmpegStrategyFactory {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Resolves the profile for `source` without allocating a strategy.
    pub fn kind_for(&self, source: &Path) -> Result<MediaKind, EncodeError> {
        match MediaCategory::from_path(source) {
            Some(MediaCategory::Video) => Ok(MediaKind::Video(self.config.video.clone())),
            Some(MediaCategory::Audio) => Ok(MediaKind::Audio(self.config.audio.clone())),
            None => Err(EncodeError::UnsupportedFormat {
                path: source.to_path_buf(),
            }),
        }
    }

    /// Checks that the ffmpeg and ffprobe binaries can be executed.
    pub async fn validate(&self) -> Result<(), EncodeError> {
        if let Err(e) = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await
        {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EncodeError::EncoderNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(EncodeError::Io(e));
        }

        if let Err(e) = Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await
        {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EncodeError::ProbeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(EncodeError::Io(e));
        }

        if let Some(ref dir) = self.config.output_dir {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|_| EncodeError::OutputDirectoryFailed { path: dir.clone() })?;
        }

        Ok(())
    }
}

impl StrategyFactory for FfmpegStrategyFactory {
    fn create(&self, source: &Path) -> Result<Arc<dyn EncoderStrategy>, EncodeError> {
        let kind = self.kind_for(source)?;
        Ok(Arc::new(FfmpegStrategy::new(Arc::clone(&self.config), kind)))
    }
}
