//! Job queue data model.
//!
//! A [`JobQueue`] is an ordered, de-duplicated list of [`Job`]s keyed by
//! absolute source path. Scheduling is FIFO and non-preemptive: the next
//! job to run is always the earliest-inserted one whose progress is not
//! exactly 100%. Failed and canceled jobs stay eligible, so every new run
//! retries them.

mod model;
mod types;

pub use model::JobQueue;
pub use types::{Job, JobError, JobStatus, Percent};
