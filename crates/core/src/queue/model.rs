//! The ordered job queue.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::types::Job;

/// Ordered collection of jobs, unique by source path, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct JobQueue {
    jobs: Vec<Job>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a pending job unless a job with the same source path exists.
    ///
    /// Returns `true` when the job was added.
    pub fn add(&mut self, source_path: PathBuf) -> bool {
        if self.contains(&source_path) {
            return false;
        }
        self.jobs.push(Job::new(source_path));
        true
    }

    /// Adds every path in order, skipping duplicates. Returns how many were added.
    pub fn extend<I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut added = 0;
        for path in paths {
            if self.add(path) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, source_path: &Path) -> bool {
        self.jobs.iter().any(|j| j.source_path() == source_path)
    }

    /// Removes every job.
    pub fn clear(&mut self) {
        self.jobs.clear();
    }

    /// Earliest-inserted job whose progress is not exactly 100%.
    pub fn next_pending(&self) -> Option<&Job> {
        self.jobs.iter().find(|j| j.is_eligible())
    }

    /// Like [`next_pending`](Self::next_pending), but skips jobs whose path is
    /// in `attempted`. A run uses this so each job gets one attempt per run.
    pub fn next_pending_excluding(&self, attempted: &HashSet<PathBuf>) -> Option<&Job> {
        self.jobs
            .iter()
            .find(|j| j.is_eligible() && !attempted.contains(j.source_path()))
    }

    /// Mutable access to the job for `source_path`.
    pub fn get_mut(&mut self, source_path: &Path) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.source_path() == source_path)
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
