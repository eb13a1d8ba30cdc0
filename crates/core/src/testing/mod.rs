//! Test doubles for the engine's collaborators.
//!
//! # Example
//!
//! ```rust,ignore
//! use encodeq_core::testing::{RecordingPropagator, Script, ScriptedStrategyFactory};
//!
//! let factory = ScriptedStrategyFactory::new()
//!     .with_script("a.mp4", Script::succeed().progress(50.0).progress(100.0))
//!     .with_script("b.mp4", Script::fail("corrupt input"));
//! let propagator = Arc::new(RecordingPropagator::new());
//!
//! let engine = ConversionEngine::new(EngineConfig::default(), factory, propagator);
//! ```

mod recording_propagator;
mod scripted_strategy;

pub use recording_propagator::RecordingPropagator;
pub use scripted_strategy::{Finish, Script, ScriptedStrategy, ScriptedStrategyFactory, Step};
