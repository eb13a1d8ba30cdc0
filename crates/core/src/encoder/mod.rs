//! Encoder strategies.
//!
//! An [`EncoderStrategy`] turns one source file into one destination
//! file, streaming log lines and progress through callbacks. A
//! [`StrategyFactory`] picks the strategy for a path; the shipped
//! [`FfmpegStrategyFactory`] selects by extension.

mod config;
mod error;
mod factory;
mod ffmpeg;
mod traits;
mod types;

pub use config::EncoderConfig;
pub use error::EncodeError;
pub use factory::FfmpegStrategyFactory;
pub use ffmpeg::FfmpegStrategy;
pub use traits::{EncoderStrategy, LogLineCallback, ProgressCallback, StrategyFactory};
pub use types::{
    AudioFormat, AudioProfile, ContainerFormat, MediaCategory, MediaInfo, MediaKind, VideoFormat,
    VideoProfile, AUDIO_EXTENSIONS, VIDEO_EXTENSIONS,
};
