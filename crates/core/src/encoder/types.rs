//! Types for the encoder module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Source extensions handled by the video profile.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "m4v", "avi", "mov", "wmv", "webm", "ts", "m2ts", "mpg", "mpeg", "flv",
];

/// Source extensions handled by the audio profile.
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "flac", "mp3", "m4a", "aac", "ogg", "opus", "wav", "wma", "ape",
];

/// Audio output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// Free Lossless Audio Codec (lossless)
    Flac,
    /// MPEG Audio Layer III
    Mp3,
    /// Advanced Audio Coding
    Aac,
    /// Ogg Vorbis
    OggVorbis,
    /// Opus
    Opus,
}

impl AudioFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
            Self::Aac => "m4a",
            Self::OggVorbis => "ogg",
            Self::Opus => "opus",
        }
    }

    /// Returns the ffmpeg codec name for this format.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "libmp3lame",
            Self::Aac => "aac",
            Self::OggVorbis => "libvorbis",
            Self::Opus => "libopus",
        }
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac)
    }
}

/// Video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoFormat {
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    H265,
    /// VP9
    Vp9,
    /// AV1
    Av1,
    /// Copy (no re-encoding)
    Copy,
}

impl VideoFormat {
    /// Returns the ffmpeg codec name for this format.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
            Self::Vp9 => "libvpx-vp9",
            Self::Av1 => "libsvtav1",
            Self::Copy => "copy",
        }
    }
}

/// Container format for video output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerFormat {
    Mkv,
    Mp4,
    Webm,
}

impl ContainerFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mkv => "mkv",
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
        }
    }
}

/// Output settings for audio sources (and the audio track of videos).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioProfile {
    /// Target audio format.
    pub format: AudioFormat,
    /// Target bitrate in kbps (lossy formats only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    /// Target sample rate in Hz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate_hz: Option<u32>,
    /// Number of audio channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
    /// Compression level for lossless formats (0-12 for FLAC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<u8>,
}

impl Default for AudioProfile {
    fn default() -> Self {
        Self {
            format: AudioFormat::Mp3,
            bitrate_kbps: Some(320),
            sample_rate_hz: None,
            channels: None,
            compression_level: None,
        }
    }
}

/// Output settings for video sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoProfile {
    /// Target video codec.
    pub format: VideoFormat,
    /// Target container.
    pub container: ContainerFormat,
    /// Constant Rate Factor (lower = better).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crf: Option<u8>,
    /// Target video bitrate in kbps (used when `crf` is unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    /// Encoder preset, e.g. "medium".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    /// Maximum width (height scaled proportionally).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    /// Maximum height (width scaled proportionally).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    /// Audio track settings; `None` copies the source audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioProfile>,
}

impl Default for VideoProfile {
    fn default() -> Self {
        Self {
            format: VideoFormat::H265,
            container: ContainerFormat::Mkv,
            crf: Some(22),
            bitrate_kbps: None,
            preset: Some("medium".to_string()),
            max_width: None,
            max_height: None,
            audio: Some(AudioProfile {
                format: AudioFormat::Aac,
                bitrate_kbps: Some(192),
                ..Default::default()
            }),
        }
    }
}

/// Broad category of a source file, detected from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    Video,
    Audio,
}

impl MediaCategory {
    /// Detects the category from the (case-insensitive) extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Audio)
        } else {
            None
        }
    }
}

/// The encoding variant selected for one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaKind {
    Video(VideoProfile),
    Audio(AudioProfile),
}

impl MediaKind {
    /// Extension of the produced file.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Video(v) => v.container.extension(),
            Self::Audio(a) => a.format.extension(),
        }
    }
}

/// Information about a media file, as reported by ffprobe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// File path.
    pub path: PathBuf,
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Container format (e.g., "flac", "matroska").
    pub format: String,
}
