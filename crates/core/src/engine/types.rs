//! Engine types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::queue::{Job, JobError, JobStatus, Percent};

/// Errors returned by engine commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// `start` while a run is draining.
    #[error("a conversion is already in progress")]
    AlreadyConverting,

    /// Queue mutation while a run is draining.
    #[error("the queue cannot be modified while a conversion is in progress")]
    QueueLocked,
}

/// Run state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Draining,
}

/// Counts for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    /// Unset while the run is draining.
    pub finished_at: Option<DateTime<Utc>>,
    pub completed: usize,
    pub failed: usize,
    pub canceled: usize,
    /// The run ended on a terminate request rather than an empty queue.
    pub stopped_by_terminate: bool,
}

impl RunSummary {
    pub(crate) fn starting_now() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            completed: 0,
            failed: 0,
            canceled: 0,
            stopped_by_terminate: false,
        }
    }
}

/// Observable engine events, broadcast to every subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    RunStarted,
    JobStarted {
        path: PathBuf,
    },
    Progress {
        path: PathBuf,
        percent: Percent,
    },
    /// `index` is the line's position in the engine log.
    LogLine {
        index: usize,
        line: String,
    },
    JobCompleted {
        path: PathBuf,
        destination: PathBuf,
    },
    JobFailed {
        path: PathBuf,
        error: String,
    },
    JobCanceled {
        path: PathBuf,
    },
    RunFinished {
        summary: RunSummary,
    },
    QueueChanged {
        len: usize,
    },
}

/// One job as shown to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub path: PathBuf,
    pub progress: Option<Percent>,
    pub error: Option<JobError>,
    pub status: JobStatus,
    pub description: String,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            path: job.source_path().to_path_buf(),
            progress: job.progress(),
            error: job.error().cloned(),
            status: job.status(),
            description: job.description(),
        }
    }
}

/// Point-in-time copy of the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub converting: bool,
    pub jobs: Vec<JobView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = EngineEvent::Progress {
            path: PathBuf::from("/media/a.mp4"),
            percent: Percent::from_f64(12.5),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["path"], "/media/a.mp4");
        assert_eq!(json["percent"], 12.5);

        let json = serde_json::to_value(EngineEvent::RunStarted).unwrap();
        assert_eq!(json["type"], "run_started");
    }

    #[test]
    fn test_job_view_from_job() {
        let mut job = Job::new(PathBuf::from("/media/a.mp4"));
        job.begin_attempt();
        job.report_progress(Percent::from_f64(30.0));
        job.fail(JobError::Canceled);

        let view = JobView::from(&job);
        assert_eq!(view.status, JobStatus::Canceled);
        assert_eq!(view.description, "30.00% canceled");
        assert_eq!(view.progress, Some(Percent::from_f64(30.0)));
    }
}
