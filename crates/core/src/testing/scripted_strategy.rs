//! Scripted encoder strategy for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::encoder::{
    EncodeError, EncoderStrategy, LogLineCallback, ProgressCallback, StrategyFactory,
};
use crate::queue::Percent;

/// One step of a scripted encode.
#[derive(Debug, Clone)]
pub enum Step {
    Log(String),
    Progress(f64),
    /// Sleeps, waking early on terminate.
    Pause(Duration),
}

/// How a scripted encode ends once its steps have run.
#[derive(Debug, Clone)]
pub enum Finish {
    /// Returns the destination (or `Terminated` if terminate was called).
    Succeed,
    /// Returns `EncodeFailed` with this message.
    Fail(String),
    /// Waits for `terminate` and returns `Terminated`.
    BlockUntilTerminated,
    /// Never returns, ignoring `terminate`.
    Hang,
}

/// Behavior of one encode attempt.
#[derive(Debug, Clone)]
pub struct Script {
    steps: Vec<Step>,
    finish: Finish,
    write_output: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self::succeed()
    }
}

impl Script {
    pub fn succeed() -> Self {
        Self {
            steps: Vec::new(),
            finish: Finish::Succeed,
            write_output: false,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            finish: Finish::Fail(message.into()),
            ..Self::succeed()
        }
    }

    pub fn block_until_terminated() -> Self {
        Self {
            finish: Finish::BlockUntilTerminated,
            ..Self::succeed()
        }
    }

    pub fn hang() -> Self {
        Self {
            finish: Finish::Hang,
            ..Self::succeed()
        }
    }

    pub fn log(mut self, line: impl Into<String>) -> Self {
        self.steps.push(Step::Log(line.into()));
        self
    }

    pub fn progress(mut self, percent: f64) -> Self {
        self.steps.push(Step::Progress(percent));
        self
    }

    pub fn pause(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Pause(duration));
        self
    }

    /// Writes the destination file before finishing, so cleanup can be
    /// observed on disk.
    pub fn writing_output(mut self) -> Self {
        self.write_output = true;
        self
    }
}

/// Strategy that plays back a [`Script`].
///
/// The destination is the source path with `.encoded` appended.
pub struct ScriptedStrategy {
    script: Script,
    cancel: CancellationToken,
}

impl ScriptedStrategy {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            cancel: CancellationToken::new(),
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[async_trait]
impl EncoderStrategy for ScriptedStrategy {
    fn name(&self) -> &str {
        "scripted"
    }

    fn destination(&self, source: &Path) -> PathBuf {
        let mut name = source.as_os_str().to_os_string();
        name.push(".encoded");
        PathBuf::from(name)
    }

    async fn encode(
        &self,
        source: &Path,
        on_log: LogLineCallback,
        on_progress: ProgressCallback,
    ) -> Result<PathBuf, EncodeError> {
        for step in &self.script.steps {
            match step {
                Step::Log(line) => on_log(line.clone()),
                Step::Progress(percent) => on_progress(Percent::from_f64(*percent)),
                Step::Pause(duration) => {
                    tokio::select! {
                        _ = tokio::time::sleep(*duration) => {}
                        _ = self.cancel.cancelled() => {}
                    }
                }
            }
        }

        let destination = self.destination(source);
        if self.script.write_output {
            tokio::fs::write(&destination, b"encoded").await?;
        }

        match &self.script.finish {
            Finish::Succeed if self.cancel.is_cancelled() => Err(EncodeError::Terminated),
            Finish::Succeed => Ok(destination),
            Finish::Fail(message) => Err(EncodeError::encode_failed(message.clone(), None)),
            Finish::BlockUntilTerminated => {
                self.cancel.cancelled().await;
                Err(EncodeError::Terminated)
            }
            Finish::Hang => std::future::pending().await,
        }
    }

    fn terminate(&self) {
        self.cancel.cancel();
    }
}

/// Factory handing out [`ScriptedStrategy`] instances keyed by file name.
///
/// Each file name holds a queue of scripts, one per attempt; the last one
/// repeats. Unknown file names get the default script, and rejected
/// extensions fail with `UnsupportedFormat`.
#[derive(Default)]
pub struct ScriptedStrategyFactory {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    default_script: Script,
    rejected_extensions: Vec<String>,
    created: Mutex<Vec<PathBuf>>,
    last: Mutex<Option<Arc<ScriptedStrategy>>>,
}

impl ScriptedStrategyFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script used for `file_name`, appended after any earlier attempts.
    pub fn with_script(self, file_name: &str, script: Script) -> Self {
        lock(&self.scripts)
            .entry(file_name.to_string())
            .or_default()
            .push_back(script);
        self
    }

    pub fn with_default(mut self, script: Script) -> Self {
        self.default_script = script;
        self
    }

    pub fn rejecting(mut self, extension: &str) -> Self {
        self.rejected_extensions.push(extension.to_string());
        self
    }

    /// Sources a strategy was created for, in order.
    pub fn created(&self) -> Vec<PathBuf> {
        lock(&self.created).clone()
    }

    /// The most recently created strategy.
    pub fn last_strategy(&self) -> Option<Arc<ScriptedStrategy>> {
        lock(&self.last).clone()
    }

    fn next_script(&self, source: &Path) -> Script {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut scripts = lock(&self.scripts);
        match scripts.get_mut(&name) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => queue.front().cloned().unwrap_or_default(),
            None => self.default_script.clone(),
        }
    }
}

impl StrategyFactory for ScriptedStrategyFactory {
    fn create(&self, source: &Path) -> Result<Arc<dyn EncoderStrategy>, EncodeError> {
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if ext.is_empty() || self.rejected_extensions.iter().any(|r| r == ext) {
            return Err(EncodeError::UnsupportedFormat {
                path: source.to_path_buf(),
            });
        }

        let strategy = Arc::new(ScriptedStrategy::new(self.next_script(source)));
        lock(&self.created).push(source.to_path_buf());
        *lock(&self.last) = Some(Arc::clone(&strategy));
        Ok(strategy)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
