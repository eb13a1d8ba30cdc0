//! Configuration for the encoder module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::types::{AudioProfile, VideoProfile};

/// Configuration for the ffmpeg-based strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Timeout for a single encode in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Directory for encoded files. Defaults to the source file's directory.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Appended to the source file stem to build the output file name.
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,

    /// Profile used for video sources.
    #[serde(default)]
    pub video: VideoProfile,

    /// Profile used for audio sources.
    #[serde(default)]
    pub audio: AudioProfile,

    /// Additional ffmpeg arguments, inserted before the output path.
    #[serde(default)]
    pub extra_ffmpeg_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    86_400 // 24 hours
}

fn default_output_suffix() -> String {
    "_converted".to_string()
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            ffmpeg_log_level: default_log_level(),
            timeout_secs: default_timeout(),
            output_dir: None,
            output_suffix: default_output_suffix(),
            video: VideoProfile::default(),
            audio: AudioProfile::default(),
            extra_ffmpeg_args: Vec::new(),
        }
    }
}

impl EncoderConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the output directory.
    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = Some(output_dir);
        self
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
