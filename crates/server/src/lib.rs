//! HTTP and WebSocket front end for the conversion engine.

pub mod api;
pub mod metrics;
pub mod state;
