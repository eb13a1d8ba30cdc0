//! Sequential media conversion queue.
//!
//! A [`ConversionEngine`] keeps an ordered list of source files and
//! converts them one at a time through an [`EncoderStrategy`] chosen by a
//! [`StrategyFactory`]. Progress, log lines and outcomes are observable
//! through snapshots and a broadcast event stream.

pub mod config;
pub mod encoder;
pub mod engine;
pub mod metrics;
pub mod propagator;
pub mod queue;
pub mod testing;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, LogFormat, LoggingConfig, ServerConfig,
};
pub use encoder::{
    AudioFormat, AudioProfile, ContainerFormat, EncodeError, EncoderConfig, EncoderStrategy,
    FfmpegStrategy, FfmpegStrategyFactory, LogLineCallback, MediaCategory, MediaInfo, MediaKind,
    ProgressCallback, StrategyFactory, VideoFormat, VideoProfile,
};
pub use engine::{
    ConversionEngine, EngineConfig, EngineError, EngineEvent, EngineState, JobView,
    QueueSnapshot, RunSummary,
};
pub use propagator::{AttributePropagator, FsAttributePropagator, PropagatorError};
pub use queue::{Job, JobError, JobQueue, JobStatus, Percent};
