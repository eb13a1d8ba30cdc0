//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the conversion engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the event broadcast channel.
    /// Subscribers that fall further behind see a lag and must backfill.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// How long a terminated encode may keep running before the engine
    /// abandons it. `None` waits for the strategy indefinitely.
    #[serde(default = "default_terminate_grace")]
    pub terminate_grace_secs: Option<u64>,
}

fn default_event_buffer() -> usize {
    1024
}

fn default_terminate_grace() -> Option<u64> {
    Some(30)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_buffer: default_event_buffer(),
            terminate_grace_secs: default_terminate_grace(),
        }
    }
}

impl EngineConfig {
    pub fn terminate_grace(&self) -> Option<Duration> {
        self.terminate_grace_secs.map(Duration::from_secs)
    }
}
