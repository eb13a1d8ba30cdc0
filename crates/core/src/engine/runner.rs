//! Conversion engine implementation.
//!
//! Drains the queue on one background task, one encode at a time:
//! - Jobs are taken FIFO, skipping complete ones and those already
//!   attempted in the current run
//! - Strategy callbacks feed a channel; the worker applies them to the
//!   queue and log, then broadcasts them
//! - Terminate is cooperative, bounded by an optional grace period

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::encoder::{EncoderStrategy, LogLineCallback, ProgressCallback, StrategyFactory};
use crate::metrics;
use crate::propagator::AttributePropagator;
use crate::queue::{Job, JobError, JobQueue, Percent};

use super::config::EngineConfig;
use super::types::{EngineError, EngineEvent, EngineState, JobView, QueueSnapshot, RunSummary};

/// Callback traffic from the active strategy.
enum StrategyEvent {
    Log(String),
    Progress(Percent),
}

struct Shared<F> {
    config: EngineConfig,
    factory: F,
    propagator: Arc<dyn AttributePropagator>,
    queue: RwLock<JobQueue>,
    log: RwLock<Vec<String>>,
    state: watch::Sender<EngineState>,
    terminate_requested: watch::Sender<bool>,
    active: Mutex<Option<Arc<dyn EncoderStrategy>>>,
    last_run: RwLock<Option<RunSummary>>,
    events: broadcast::Sender<EngineEvent>,
}

/// The conversion engine - drains the job queue through encoder strategies.
///
/// Cloning is cheap; all clones drive the same engine.
pub struct ConversionEngine<F> {
    shared: Arc<Shared<F>>,
}

impl<F> Clone for ConversionEngine<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F> ConversionEngine<F>
where
    F: StrategyFactory + 'static,
{
    /// Create a new idle engine with an empty queue.
    pub fn new(
        config: EngineConfig,
        factory: F,
        propagator: Arc<dyn AttributePropagator>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let (state, _) = watch::channel(EngineState::Idle);
        let (terminate_requested, _) = watch::channel(false);

        Self {
            shared: Arc::new(Shared {
                config,
                factory,
                propagator,
                queue: RwLock::new(JobQueue::new()),
                log: RwLock::new(Vec::new()),
                state,
                terminate_requested,
                active: Mutex::new(None),
                last_run: RwLock::new(None),
                events,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn state(&self) -> EngineState {
        *self.shared.state.borrow()
    }

    /// Whether a run is draining the queue.
    pub fn is_converting(&self) -> bool {
        self.state() == EngineState::Draining
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    /// Add paths to the queue, ignoring those already present.
    ///
    /// Paths are made absolute against the current directory without
    /// touching the filesystem. Returns how many jobs were added.
    pub async fn enqueue<I, P>(&self, paths: I) -> Result<usize, EngineError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut queue = self.shared.queue.write().await;
        if self.is_converting() {
            return Err(EngineError::QueueLocked);
        }

        let mut added = 0;
        for path in paths {
            let path = path.as_ref();
            match std::path::absolute(path) {
                Ok(absolute) => {
                    if queue.add(absolute) {
                        added += 1;
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Ignoring unusable path"),
            }
        }

        let len = queue.len();
        drop(queue);

        if added > 0 {
            debug!(added, len, "Enqueued jobs");
            metrics::QUEUE_LENGTH.set(len as i64);
            self.shared.emit(EngineEvent::QueueChanged { len });
        }
        Ok(added)
    }

    /// Empty the queue and the log.
    pub async fn clear(&self) -> Result<(), EngineError> {
        let mut queue = self.shared.queue.write().await;
        if self.is_converting() {
            return Err(EngineError::QueueLocked);
        }
        queue.clear();
        drop(queue);

        self.shared.log.write().await.clear();
        metrics::QUEUE_LENGTH.set(0);
        self.shared.emit(EngineEvent::QueueChanged { len: 0 });
        Ok(())
    }

    /// Start draining the queue on a background task.
    ///
    /// Clears the log of the previous run. Must be called within a tokio
    /// runtime.
    pub async fn start(&self) -> Result<(), EngineError> {
        let shared = &self.shared;

        let started = shared.state.send_if_modified(|state| {
            if *state == EngineState::Draining {
                return false;
            }
            // A late terminate from the previous run must not stop this one.
            // Only reset once the run is ours, so a rejected start keeps a
            // pending terminate for the active run.
            shared.terminate_requested.send_replace(false);
            *state = EngineState::Draining;
            shared.emit(EngineEvent::RunStarted);
            true
        });
        if !started {
            return Err(EngineError::AlreadyConverting);
        }

        shared.log.write().await.clear();
        metrics::CONVERSION_ACTIVE.set(1);
        info!("Conversion run started");

        tokio::spawn(drain(Arc::clone(shared)));
        Ok(())
    }

    /// Request cooperative termination of the active job.
    ///
    /// The run stops after the active job settles; remaining jobs stay
    /// queued. Returns `false` when no run is draining.
    pub async fn terminate(&self) -> bool {
        let shared = &self.shared;
        if !self.is_converting() {
            return false;
        }

        shared.terminate_requested.send_replace(true);
        if let Some(strategy) = shared.active.lock().await.as_ref() {
            info!(strategy = strategy.name(), "Terminating active encode");
            strategy.terminate();
        }
        true
    }

    /// Wait until no run is draining.
    pub async fn wait_until_idle(&self) {
        let mut state = self.shared.state.subscribe();
        // The sender lives in `shared`, so this only ends on Idle
        let _ = state.wait_for(|s| *s == EngineState::Idle).await;
    }

    /// Copy of all jobs in queue order.
    pub async fn jobs(&self) -> Vec<Job> {
        self.shared.queue.read().await.jobs().to_vec()
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let queue = self.shared.queue.read().await;
        QueueSnapshot {
            converting: self.is_converting(),
            jobs: queue.jobs().iter().map(JobView::from).collect(),
        }
    }

    /// Log lines starting at `from`.
    pub async fn log_lines_from(&self, from: usize) -> Vec<String> {
        let log = self.shared.log.read().await;
        log.get(from..).map(<[String]>::to_vec).unwrap_or_default()
    }

    pub async fn log_len(&self) -> usize {
        self.shared.log.read().await.len()
    }

    /// Summary of the most recent finished run.
    pub async fn last_run(&self) -> Option<RunSummary> {
        self.shared.last_run.read().await.clone()
    }
}

impl<F> Shared<F>
where
    F: StrategyFactory,
{
    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Consumes a pending terminate request.
    fn take_terminate_request(&self) -> bool {
        self.terminate_requested.send_replace(false)
    }

    async fn update_job<R>(&self, path: &Path, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        self.queue.write().await.get_mut(path).map(f)
    }

    async fn apply(&self, path: &Path, event: StrategyEvent) {
        match event {
            StrategyEvent::Log(line) => {
                let mut log = self.log.write().await;
                let index = log.len();
                log.push(line.clone());
                drop(log);
                debug!(index, line = %line, "Encoder log");
                self.emit(EngineEvent::LogLine { index, line });
            }
            StrategyEvent::Progress(percent) => {
                let advanced = self
                    .update_job(path, |job| job.report_progress(percent))
                    .await
                    .unwrap_or(false);
                if advanced {
                    debug!(path = %path.display(), percent = %percent, "Progress");
                    self.emit(EngineEvent::Progress {
                        path: path.to_path_buf(),
                        percent,
                    });
                }
            }
        }
    }

    /// Picks the next pending job and resets it for a new attempt.
    /// Picks the next job not yet attempted in this run and resets it for
    /// a new attempt.
    async fn begin_next(&self, attempted: &mut HashSet<PathBuf>) -> Option<PathBuf> {
        let mut queue = self.queue.write().await;
        let path = queue
            .next_pending_excluding(attempted)?
            .source_path()
            .to_path_buf();
        if let Some(job) = queue.get_mut(&path) {
            job.begin_attempt();
        }
        attempted.insert(path.clone());
        Some(path)
    }
}

/// Background drain loop for one run.
async fn drain<F>(shared: Arc<Shared<F>>)
where
    F: StrategyFactory,
{
    let mut summary = RunSummary::starting_now();
    // Failed jobs stay eligible, but are only retried by the next run
    let mut attempted = HashSet::new();

    loop {
        if shared.take_terminate_request() {
            summary.stopped_by_terminate = true;
            break;
        }

        let Some(path) = shared.begin_next(&mut attempted).await else {
            break;
        };

        run_job(&shared, &path, &mut summary).await;
    }

    summary.finished_at = Some(chrono::Utc::now());
    *shared.last_run.write().await = Some(summary.clone());
    metrics::CONVERSION_ACTIVE.set(0);
    info!(
        completed = summary.completed,
        failed = summary.failed,
        canceled = summary.canceled,
        stopped_by_terminate = summary.stopped_by_terminate,
        "Conversion run finished"
    );

    shared.state.send_modify(|state| {
        *state = EngineState::Idle;
        shared.emit(EngineEvent::RunFinished { summary });
    });
}

/// One attempt at one job: select, encode, then settle the outcome.
async fn run_job<F>(shared: &Shared<F>, path: &Path, summary: &mut RunSummary)
where
    F: StrategyFactory,
{
    let started = Instant::now();
    info!(path = %path.display(), "Starting job");
    shared.emit(EngineEvent::JobStarted {
        path: path.to_path_buf(),
    });
    shared.emit(EngineEvent::Progress {
        path: path.to_path_buf(),
        percent: Percent::ZERO,
    });

    let strategy = match shared.factory.create(path) {
        Ok(strategy) => strategy,
        Err(e) => {
            warn!(path = %path.display(), error = %e, kind = e.kind(), "No encoder for job");
            metrics::JOB_FAILURES.with_label_values(&[e.kind()]).inc();
            let error = e.to_string();
            shared
                .update_job(path, |job| job.fail(JobError::failed(error.clone())))
                .await;
            shared.emit(EngineEvent::JobFailed {
                path: path.to_path_buf(),
                error,
            });
            summary.failed += 1;
            record_outcome("unsupported", started);
            return;
        }
    };

    // Publish the handle before checking the flag so a concurrent
    // terminate reaches this strategy one way or the other
    *shared.active.lock().await = Some(Arc::clone(&strategy));
    if *shared.terminate_requested.borrow() {
        strategy.terminate();
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let on_log: LogLineCallback = {
        let tx = tx.clone();
        Arc::new(move |line| {
            let _ = tx.send(StrategyEvent::Log(line));
        })
    };
    let on_progress: ProgressCallback = Arc::new(move |percent| {
        let _ = tx.send(StrategyEvent::Progress(percent));
    });

    let result = {
        let encode = strategy.encode(path, on_log, on_progress);
        tokio::pin!(encode);

        let mut terminate_rx = shared.terminate_requested.subscribe();
        let grace = shared.config.terminate_grace();
        let mut deadline = grace
            .filter(|_| *terminate_rx.borrow_and_update())
            .map(|g| tokio::time::Instant::now() + g);

        loop {
            tokio::select! {
                biased;
                Some(event) = rx.recv() => shared.apply(path, event).await,
                result = &mut encode => break Some(result),
                Ok(()) = terminate_rx.changed(), if deadline.is_none() => {
                    if *terminate_rx.borrow_and_update() {
                        deadline = grace.map(|g| tokio::time::Instant::now() + g);
                    }
                }
                _ = sleep_until(deadline), if deadline.is_some() => {
                    warn!(
                        path = %path.display(),
                        strategy = strategy.name(),
                        "Encoder ignored terminate, abandoning encode"
                    );
                    break None;
                }
            }
        }
    };

    // Callbacks that fired just before encode returned
    while let Ok(event) = rx.try_recv() {
        shared.apply(path, event).await;
    }

    let outcome = if *shared.terminate_requested.borrow() {
        let destination = match &result {
            Some(Ok(destination)) => destination.clone(),
            _ => strategy.destination(path),
        };
        if let Err(e) = shared.propagator.delete_file(&destination).await {
            warn!(path = %destination.display(), error = %e, "Failed to delete canceled output");
        }
        shared.update_job(path, |job| job.fail(JobError::Canceled)).await;
        info!(path = %path.display(), "Job canceled");
        shared.emit(EngineEvent::JobCanceled {
            path: path.to_path_buf(),
        });
        summary.canceled += 1;
        "canceled"
    } else {
        match result {
            Some(Ok(destination)) => {
                if let Err(e) = shared.propagator.copy_attributes(path, &destination).await {
                    warn!(
                        path = %destination.display(),
                        error = %e,
                        "Failed to copy file attributes"
                    );
                }
                shared.update_job(path, Job::complete).await;
                shared.emit(EngineEvent::Progress {
                    path: path.to_path_buf(),
                    percent: Percent::COMPLETE,
                });
                info!(
                    path = %path.display(),
                    destination = %destination.display(),
                    "Job completed"
                );
                shared.emit(EngineEvent::JobCompleted {
                    path: path.to_path_buf(),
                    destination,
                });
                summary.completed += 1;
                "completed"
            }
            Some(Err(e)) => {
                warn!(path = %path.display(), error = %e, kind = e.kind(), "Job failed");
                metrics::JOB_FAILURES.with_label_values(&[e.kind()]).inc();
                let error = e.to_string();
                shared
                    .update_job(path, |job| job.fail(JobError::failed(error.clone())))
                    .await;
                shared.emit(EngineEvent::JobFailed {
                    path: path.to_path_buf(),
                    error,
                });
                summary.failed += 1;
                "failed"
            }
            // Only abandoned after a terminate request, handled above
            None => "canceled",
        }
    };

    *shared.active.lock().await = None;
    record_outcome(outcome, started);
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn record_outcome(outcome: &str, started: Instant) {
    metrics::JOBS_TOTAL.with_label_values(&[outcome]).inc();
    metrics::JOB_DURATION
        .with_label_values(&[outcome])
        .observe(started.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::JobStatus;
    use crate::testing::{RecordingPropagator, Script, ScriptedStrategyFactory};
    use std::time::Duration;

    fn engine(
        factory: ScriptedStrategyFactory,
    ) -> (
        ConversionEngine<Arc<ScriptedStrategyFactory>>,
        Arc<ScriptedStrategyFactory>,
        Arc<RecordingPropagator>,
    ) {
        let factory = Arc::new(factory);
        let propagator = Arc::new(RecordingPropagator::new());
        let engine = ConversionEngine::new(
            EngineConfig::default(),
            Arc::clone(&factory),
            Arc::clone(&propagator) as Arc<dyn AttributePropagator>,
        );
        (engine, factory, propagator)
    }

    async fn run_to_idle<F: StrategyFactory + 'static>(engine: &ConversionEngine<F>) {
        engine.start().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), engine.wait_until_idle())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_enqueue_dedups_and_makes_absolute() {
        let (engine, _, _) = engine(ScriptedStrategyFactory::new());

        let added = engine
            .enqueue(["/media/a.mp4", "/media/b.mp4", "/media/a.mp4"])
            .await
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(engine.enqueue(["/media/b.mp4"]).await.unwrap(), 0);

        let added = engine.enqueue(["relative.mp4"]).await.unwrap();
        assert_eq!(added, 1);
        let jobs = engine.jobs().await;
        assert!(jobs[2].source_path().is_absolute());
        assert!(jobs[2].source_path().ends_with("relative.mp4"));
    }

    #[tokio::test]
    async fn test_successful_drain_completes_all() {
        let (engine, factory, propagator) = engine(
            ScriptedStrategyFactory::new()
                .with_script("a.mp4", Script::succeed().progress(10.0).progress(50.0)),
        );
        engine.enqueue(["/media/a.mp4", "/media/b.mp4"]).await.unwrap();

        run_to_idle(&engine).await;

        for job in engine.jobs().await {
            assert_eq!(job.progress(), Some(Percent::COMPLETE));
            assert!(job.error().is_none());
        }
        assert_eq!(factory.created().len(), 2);
        assert_eq!(propagator.copies().await.len(), 2);
        assert!(!engine.is_converting());
    }

    #[tokio::test]
    async fn test_failure_keeps_progress_and_continues() {
        let (engine, _, _) = engine(
            ScriptedStrategyFactory::new()
                .with_script("c.mp4", Script::fail("corrupt stream").progress(30.0)),
        );
        engine.enqueue(["/media/c.mp4", "/media/d.mp4"]).await.unwrap();

        run_to_idle(&engine).await;

        let jobs = engine.jobs().await;
        assert_eq!(jobs[0].progress(), Some(Percent::from_f64(30.0)));
        assert_eq!(jobs[0].status(), JobStatus::Failed);
        assert!(jobs[0]
            .error()
            .unwrap()
            .to_string()
            .contains("corrupt stream"));
        assert_eq!(jobs[1].status(), JobStatus::Complete);
    }

    #[tokio::test]
    async fn test_failed_job_attempted_once_per_run() {
        let (engine, factory, _) = engine(
            ScriptedStrategyFactory::new()
                .with_script("c.mp4", Script::fail("always broken").progress(30.0)),
        );
        engine.enqueue(["/m/c.mp4", "/m/d.mp4"]).await.unwrap();

        run_to_idle(&engine).await;

        assert_eq!(engine.state(), EngineState::Idle);
        assert_eq!(
            factory.created(),
            vec![PathBuf::from("/m/c.mp4"), PathBuf::from("/m/d.mp4")]
        );
        let jobs = engine.jobs().await;
        assert_eq!(jobs[0].status(), JobStatus::Failed);
        assert_eq!(jobs[1].status(), JobStatus::Complete);

        // The next run retries it, once
        run_to_idle(&engine).await;
        let created = factory.created();
        assert_eq!(created.len(), 3);
        assert_eq!(created[2], PathBuf::from("/m/c.mp4"));
    }

    #[tokio::test]
    async fn test_rejected_start_keeps_pending_terminate() {
        let (engine, factory, propagator) = engine(
            ScriptedStrategyFactory::new()
                .with_default(Script::block_until_terminated().progress(10.0)),
        );
        engine.enqueue(["/m/a.mp4", "/m/b.mp4"]).await.unwrap();
        let mut events = engine.subscribe();
        engine.start().await.unwrap();
        while !matches!(events.recv().await, Ok(EngineEvent::JobStarted { .. })) {}

        assert!(engine.terminate().await);
        assert_eq!(engine.start().await, Err(EngineError::AlreadyConverting));
        tokio::time::timeout(Duration::from_secs(5), engine.wait_until_idle())
            .await
            .unwrap();

        let jobs = engine.jobs().await;
        assert_eq!(jobs[0].status(), JobStatus::Canceled);
        assert_eq!(jobs[1].status(), JobStatus::Pending);
        assert_eq!(factory.created(), vec![PathBuf::from("/m/a.mp4")]);
        assert_eq!(propagator.deletes().await.len(), 1);
        assert!(engine.last_run().await.unwrap().stopped_by_terminate);
    }

    #[tokio::test]
    async fn test_failures_counted_by_error_kind() {
        let failures = |reason: &str| metrics::JOB_FAILURES.with_label_values(&[reason]).get();
        let encode_before = failures("encode_failed");
        let unsupported_before = failures("unsupported_format");
        let (engine, _, _) = engine(
            ScriptedStrategyFactory::new()
                .rejecting("txt")
                .with_script("a.mp4", Script::fail("decoder error")),
        );
        engine.enqueue(["/media/a.mp4", "/docs/b.txt"]).await.unwrap();

        run_to_idle(&engine).await;

        // Counters are process-wide and other tests run concurrently
        assert!(failures("encode_failed") > encode_before);
        assert!(failures("unsupported_format") > unsupported_before);
    }

    #[tokio::test]
    async fn test_unsupported_format_fails_job_only() {
        let (engine, factory, _) = engine(ScriptedStrategyFactory::new().rejecting("txt"));
        engine.enqueue(["/docs/a.txt", "/media/b.mp4"]).await.unwrap();

        run_to_idle(&engine).await;

        let jobs = engine.jobs().await;
        assert_eq!(jobs[0].status(), JobStatus::Failed);
        assert!(jobs[0]
            .error()
            .unwrap()
            .to_string()
            .starts_with("Unsupported format"));
        assert_eq!(jobs[1].status(), JobStatus::Complete);
        assert_eq!(factory.created(), vec![PathBuf::from("/media/b.mp4")]);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_within_attempt() {
        let (engine, _, _) = engine(
            ScriptedStrategyFactory::new().with_script(
                "a.mp4",
                Script::fail("stop")
                    .progress(40.0)
                    .progress(20.0)
                    .progress(45.0),
            ),
        );
        engine.enqueue(["/media/a.mp4"]).await.unwrap();
        let mut events = engine.subscribe();

        run_to_idle(&engine).await;

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::Progress { percent, .. } = event {
                seen.push(percent.as_f64());
            }
        }
        assert_eq!(seen, vec![0.0, 40.0, 45.0]);
        assert_eq!(
            engine.jobs().await[0].progress(),
            Some(Percent::from_f64(45.0))
        );
    }

    #[tokio::test]
    async fn test_log_lines_in_order_and_cleared_on_start() {
        let (engine, _, _) = engine(
            ScriptedStrategyFactory::new()
                .with_script("a.mp4", Script::succeed().log("a1").log("a2"))
                .with_script("b.mp4", Script::succeed().log("b1")),
        );
        engine.enqueue(["/media/a.mp4", "/media/b.mp4"]).await.unwrap();

        run_to_idle(&engine).await;
        assert_eq!(engine.log_lines_from(0).await, vec!["a1", "a2", "b1"]);
        assert_eq!(engine.log_lines_from(2).await, vec!["b1"]);
        assert!(engine.log_lines_from(10).await.is_empty());

        // Everything is complete; a new run only resets the log
        run_to_idle(&engine).await;
        assert_eq!(engine.log_len().await, 0);
    }

    #[tokio::test]
    async fn test_queue_locked_while_draining() {
        let (engine, _, _) = engine(
            ScriptedStrategyFactory::new().with_default(Script::block_until_terminated()),
        );
        engine.enqueue(["/media/a.mp4"]).await.unwrap();
        let mut events = engine.subscribe();
        engine.start().await.unwrap();

        while !matches!(events.recv().await, Ok(EngineEvent::JobStarted { .. })) {}

        assert_eq!(
            engine.enqueue(["/media/b.mp4"]).await,
            Err(EngineError::QueueLocked)
        );
        assert_eq!(engine.clear().await, Err(EngineError::QueueLocked));
        assert_eq!(engine.start().await, Err(EngineError::AlreadyConverting));

        assert!(engine.terminate().await);
        engine.wait_until_idle().await;
        assert!(engine.clear().await.is_ok());
        assert!(engine.jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_terminate_when_idle_is_noop() {
        let (engine, _, _) = engine(ScriptedStrategyFactory::new());
        assert!(!engine.terminate().await);

        // A stale request never leaks into the next run
        engine.enqueue(["/media/a.mp4"]).await.unwrap();
        run_to_idle(&engine).await;
        assert_eq!(engine.jobs().await[0].status(), JobStatus::Complete);
    }

    #[tokio::test]
    async fn test_terminate_grace_abandons_hung_encode() {
        let factory = Arc::new(
            ScriptedStrategyFactory::new().with_script("a.mp4", Script::hang().progress(5.0)),
        );
        let engine = ConversionEngine::new(
            EngineConfig {
                terminate_grace_secs: Some(1),
                ..EngineConfig::default()
            },
            Arc::clone(&factory),
            Arc::new(RecordingPropagator::new()) as Arc<dyn AttributePropagator>,
        );
        engine.enqueue(["/media/a.mp4", "/media/b.mp4"]).await.unwrap();
        let mut events = engine.subscribe();
        engine.start().await.unwrap();

        while !matches!(events.recv().await, Ok(EngineEvent::Progress { percent, .. }) if percent.as_f64() == 5.0)
        {}
        assert!(engine.terminate().await);
        engine.wait_until_idle().await;

        let jobs = engine.jobs().await;
        assert_eq!(jobs[0].status(), JobStatus::Canceled);
        assert_eq!(jobs[1].status(), JobStatus::Pending);
        assert_eq!(factory.created().len(), 1);
    }

    #[tokio::test]
    async fn test_run_finished_summary() {
        let (engine, _, _) = engine(
            ScriptedStrategyFactory::new()
                .with_script("bad.mp4", Script::fail("nope"))
                .rejecting("txt"),
        );
        engine
            .enqueue(["/m/ok.mp4", "/m/bad.mp4", "/m/notes.txt"])
            .await
            .unwrap();
        let mut events = engine.subscribe();

        run_to_idle(&engine).await;

        let mut finished = None;
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::RunFinished { summary } = event {
                finished = Some(summary);
            }
        }
        let summary = finished.unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.canceled, 0);
        assert!(!summary.stopped_by_terminate);
        assert!(summary.finished_at.unwrap() >= summary.started_at);
        assert_eq!(engine.last_run().await, Some(summary));
    }

    #[tokio::test]
    async fn test_attribute_failure_does_not_fail_job() {
        let (engine, _, propagator) = engine(ScriptedStrategyFactory::new());
        propagator.set_fail_copies(true);
        engine.enqueue(["/media/a.mp4"]).await.unwrap();

        run_to_idle(&engine).await;

        let job = &engine.jobs().await[0];
        assert_eq!(job.status(), JobStatus::Complete);
        assert_eq!(propagator.copies().await.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot() {
        let (engine, _, _) = engine(ScriptedStrategyFactory::new());
        engine.enqueue(["/media/a.mp4"]).await.unwrap();

        let snapshot = engine.snapshot().await;
        assert!(!snapshot.converting);
        assert_eq!(snapshot.jobs.len(), 1);
        assert_eq!(snapshot.jobs[0].status, JobStatus::Pending);
        assert_eq!(snapshot.jobs[0].description, "");
    }
}
