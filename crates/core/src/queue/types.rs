//! Types for the queue module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A percentage in `[0, 100]` with two-decimal precision.
///
/// Stored as hundredths of a percent so that "exactly 100" is an exact
/// comparison rather than a floating point one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Percent(u16);

impl Percent {
    /// 0.00%
    pub const ZERO: Percent = Percent(0);
    /// 100.00%, the terminal success marker.
    pub const COMPLETE: Percent = Percent(10_000);

    /// Creates a percent from a float, clamping to `[0, 100]` and rounding
    /// to two decimals. NaN maps to zero.
    pub fn from_f64(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        let hundredths = (value.clamp(0.0, 100.0) * 100.0).round();
        Self(hundredths as u16)
    }

    /// Returns the value as a float.
    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    /// Whether this is exactly 100%.
    pub fn is_complete(self) -> bool {
        self == Self::COMPLETE
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl From<f64> for Percent {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl Serialize for Percent {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Percent {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Self::from_f64)
    }
}

/// Terminal error recorded on a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobError {
    /// The attempt failed (unsupported format, encoder failure, ...).
    Failed { message: String },
    /// The attempt was stopped by a terminate request.
    Canceled,
}

impl JobError {
    /// Creates a failure from any displayable error.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { message } => f.write_str(message),
            Self::Canceled => f.write_str("canceled"),
        }
    }
}

/// Status of a job, derived from its progress and error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Never started.
    Pending,
    /// Started, below 100%, no error.
    InProgress,
    /// Exactly 100%, no error.
    Complete,
    /// Last attempt failed.
    Failed,
    /// Last attempt was canceled.
    Canceled,
}

/// A single conversion job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    source_path: PathBuf,
    progress: Option<Percent>,
    error: Option<JobError>,
}

impl Job {
    /// Creates a pending job. The path is expected to be absolute.
    pub fn new(source_path: PathBuf) -> Self {
        Self {
            source_path,
            progress: None,
            error: None,
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Last recorded progress, `None` if never started.
    pub fn progress(&self) -> Option<Percent> {
        self.progress
    }

    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    pub fn status(&self) -> JobStatus {
        match (&self.error, self.progress) {
            (Some(JobError::Canceled), _) => JobStatus::Canceled,
            (Some(JobError::Failed { .. }), _) => JobStatus::Failed,
            (None, None) => JobStatus::Pending,
            (None, Some(p)) if p.is_complete() => JobStatus::Complete,
            (None, Some(_)) => JobStatus::InProgress,
        }
    }

    /// Whether the scheduler should pick this job (progress is not exactly 100).
    pub fn is_eligible(&self) -> bool {
        !self.progress.is_some_and(Percent::is_complete)
    }

    /// Resets the job for a new attempt: progress 0, error cleared.
    pub fn begin_attempt(&mut self) {
        self.progress = Some(Percent::ZERO);
        self.error = None;
    }

    /// Records a progress report. Reports lower than the current value are
    /// ignored; returns whether the value changed.
    pub fn report_progress(&mut self, percent: Percent) -> bool {
        match self.progress {
            Some(current) if percent <= current => false,
            _ => {
                self.progress = Some(percent);
                true
            }
        }
    }

    /// Marks the job complete (exactly 100%, no error).
    pub fn complete(&mut self) {
        self.progress = Some(Percent::COMPLETE);
        self.error = None;
    }

    /// Records a terminal error. Progress is left untouched.
    pub fn fail(&mut self, error: JobError) {
        self.error = Some(error);
    }

    /// Human readable progress/error summary, e.g. `"42.50% canceled"`.
    pub fn description(&self) -> String {
        let mut description = self
            .progress
            .map(|p| format!("{}%", p))
            .unwrap_or_default();
        if let Some(ref error) = self.error {
            if !description.is_empty() {
                description.push(' ');
            }
            description.push_str(&error.to_string());
        }
        description
    }

    /// Path followed by the description, as shown in a file list.
    pub fn display_line(&self) -> String {
        let description = self.description();
        if description.is_empty() {
            self.source_path.display().to_string()
        } else {
            format!("{} - {}", self.source_path.display(), description)
        }
    }
}
