//! Conversion engine.
//!
//! Owns the job queue and the run log, and drains the queue one job at a
//! time through strategies picked by a [`StrategyFactory`](crate::encoder::StrategyFactory).
//!
//! State machine per run: `Idle -> Draining -> Idle`. A run starts on
//! [`ConversionEngine::start`] and ends when no pending job remains or
//! after a terminate request has settled the active job.

mod config;
mod runner;
mod types;

pub use config::EngineConfig;
pub use runner::ConversionEngine;
pub use types::{EngineError, EngineEvent, EngineState, JobView, QueueSnapshot, RunSummary};
