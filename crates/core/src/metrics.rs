//! Prometheus metrics for the conversion engine.
//!
//! Registered into the server's registry via [`all_metrics`].

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Engine Metrics
// =============================================================================

/// Finished job attempts by outcome.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("encodeq_jobs_total", "Total finished job attempts"),
        &["outcome"], // "completed", "failed", "canceled", "unsupported"
    )
    .unwrap()
});

/// Failed job attempts by error kind.
pub static JOB_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("encodeq_job_failures_total", "Failed job attempts by reason"),
        &["reason"],
    )
    .unwrap()
});

/// Duration of one job attempt in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "encodeq_job_duration_seconds",
            "Duration of a job attempt",
        )
        .buckets(vec![
            1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0,
        ]),
        &["outcome"],
    )
    .unwrap()
});

/// 1 while a run is draining the queue.
pub static CONVERSION_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "encodeq_conversion_active",
        "Whether a conversion run is in progress",
    )
    .unwrap()
});

/// Number of jobs in the queue.
pub static QUEUE_LENGTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("encodeq_queue_length", "Number of jobs in the queue").unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_TOTAL.clone()),
        Box::new(JOB_FAILURES.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(CONVERSION_ACTIVE.clone()),
        Box::new(QUEUE_LENGTH.clone()),
    ]
}
