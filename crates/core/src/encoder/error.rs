//! Error types for the encoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while selecting or running an encoder strategy.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// No strategy recognises the source file.
    #[error("Unsupported format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    EncoderNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    ProbeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Output directory does not exist and could not be created.
    #[error("Failed to create output directory: {path}")]
    OutputDirectoryFailed { path: PathBuf },

    /// The encoding process failed.
    #[error("Encoding failed: {reason}")]
    EncodeFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Failed to probe media file.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// Failed to parse FFprobe output.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },

    /// Encoding timed out.
    #[error("Encoding timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The encode was stopped by `terminate()`.
    #[error("Encoding terminated")]
    Terminated,

    /// I/O error during encoding.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncodeError {
    /// Creates a new encode failed error with stderr output.
    pub fn encode_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::EncodeFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::EncoderNotFound { .. } | Self::ProbeNotFound { .. } => "tool_missing",
            Self::InputNotFound { .. } => "input_missing",
            Self::OutputDirectoryFailed { .. } => "output_dir",
            Self::EncodeFailed { .. } => "encode_failed",
            Self::ProbeFailed { .. } | Self::ParseError { .. } => "probe_failed",
            Self::Timeout { .. } => "timeout",
            Self::Terminated => "terminated",
            Self::Io(_) => "io",
        }
    }
}
